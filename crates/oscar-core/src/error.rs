//! Error types for the OSC engine

use bytes::Bytes;
use thiserror::Error;

/// Result type alias for OSC operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Wire bytes could not be decoded
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A packet could not be encoded
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// No handler is registered for a type tag
    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),

    /// Selector pattern could not be compiled
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Two handlers were registered for the same type tag
    #[error("a handler for type tag '{0}' is already registered")]
    DuplicateType(char),

    /// The tag is structural (`,` `[` `]`) and cannot carry a handler
    #[error("type tag '{0}' is reserved")]
    ReservedType(char),
}

/// A type tag (or argument type) with no registered [`ArgumentHandler`].
///
/// This is a configuration problem rather than a data problem, so it is
/// surfaced on its own and wrapped by both [`ParseError`] and
/// [`SerializeError`].
///
/// [`ArgumentHandler`]: crate::argument::ArgumentHandler
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no argument handler registered for type tag '{tag}'")]
pub struct UnknownTypeError {
    pub tag: char,
}

/// Failure to decode an OSC packet.
///
/// Carries the complete buffer handed to the parser so that bad-data
/// listeners can log or forward it.
#[derive(Error, Debug, Clone)]
#[error("malformed OSC packet ({} bytes): {kind}", .data.len())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub data: Bytes,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Reason a packet failed to decode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("empty packet")]
    Empty,

    #[error("buffer too small: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("length {0} is not a multiple of 4")]
    Unaligned(usize),

    #[error("non-zero padding byte at offset {0}")]
    InvalidPadding(usize),

    #[error("string starting at offset {0} is not NUL terminated")]
    UnterminatedString(usize),

    #[error("string starting at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("invalid bundle header")]
    InvalidBundleHeader,

    #[error("invalid bundle element length {0}")]
    InvalidElementLength(i32),

    #[error("invalid blob length {0}")]
    InvalidBlobLength(i32),

    #[error("type tag string must start with ',' (found 0x{0:02x})")]
    MissingTypeTagSeparator(u8),

    #[error("message has no type tag string")]
    MissingTypeTags,

    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("unbalanced array brackets in type tags {0:?}")]
    UnbalancedArray(String),

    /// Bundles or arrays nest deeper than the configured limit
    #[error("nesting exceeds the limit of {0} levels")]
    NestingTooDeep(usize),

    #[error("{0} bytes left over after the last argument")]
    TrailingBytes(usize),

    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),

    #[error("invalid '{tag}' argument: {reason}")]
    InvalidArgument { tag: char, reason: String },
}

/// Failure to encode an OSC packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// The destination cannot hold the encoded packet
    #[error("buffer overrun: need {needed} bytes, have {available}")]
    BufferOverrun { needed: usize, available: usize },

    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),

    /// The handler registered for the tag does not accept this value
    #[error("handler for type tag '{tag}' cannot encode {found}")]
    TypeMismatch { tag: char, found: &'static str },

    #[error("string contains an embedded NUL byte")]
    EmbeddedNul,

    #[error("{0} bytes do not fit a 32-bit length prefix")]
    TooLarge(usize),

    #[error("nesting exceeds the limit of {0} levels")]
    NestingTooDeep(usize),
}
