//! Argument type registry
//!
//! Each OSC argument type is implemented by an [`ArgumentHandler`] keyed by
//! its one-character type tag. The codec never interprets argument payloads
//! itself: it looks the tag up in a [`TypeRegistry`] and delegates, so new
//! types are added by registering a handler.
//!
//! ```
//! use oscar_core::argument::{FixedWidthHandler, TypeRegistry};
//!
//! let registry = TypeRegistry::standard()
//!     .with(FixedWidthHandler::new('x', 4))
//!     .unwrap();
//! assert!(registry.contains('x'));
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ParseErrorKind, SerializeError, UnknownTypeError};
use crate::time::TimeTag;
use crate::types::{tag, Argument, Color, MidiMessage, TYPE_ARRAY_BEGIN, TYPE_ARRAY_END};
use crate::wire::{self, Input};
use crate::{Error, Result};

/// Encoder/decoder for one OSC argument type
pub trait ArgumentHandler: Send + Sync + fmt::Debug {
    /// Type tag this handler is registered under
    fn tag(&self) -> char;

    /// Whether this handler can encode `argument`
    fn accepts(&self, argument: &Argument) -> bool;

    /// Decode one argument payload from `input`
    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind>;

    /// Encode the payload of `argument` (the type tag is written by the caller)
    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError>;
}

fn mismatch(tag: char, argument: &Argument) -> SerializeError {
    SerializeError::TypeMismatch {
        tag,
        found: argument.kind(),
    }
}

// ============================================================================
// BUILT-IN HANDLERS
// ============================================================================

macro_rules! scalar_handler {
    ($(#[$meta:meta])* $name:ident, $tag:expr, $variant:ident, $read:ident, $put:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl ArgumentHandler for $name {
            fn tag(&self) -> char {
                $tag
            }

            fn accepts(&self, argument: &Argument) -> bool {
                matches!(argument, Argument::$variant(_))
            }

            fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
                Ok(Argument::$variant(input.$read()?))
            }

            fn encode(
                &self,
                argument: &Argument,
                buf: &mut BytesMut,
            ) -> std::result::Result<(), SerializeError> {
                match argument {
                    Argument::$variant(v) => {
                        buf.$put(*v);
                        Ok(())
                    }
                    other => Err(mismatch($tag, other)),
                }
            }
        }
    };
}

scalar_handler!(
    /// `i`: big-endian two's complement int32
    IntHandler, tag::INT, Int, read_i32, put_i32
);
scalar_handler!(
    /// `u`: big-endian uint32
    UnsignedHandler, tag::UNSIGNED, Unsigned, read_u32, put_u32
);
scalar_handler!(
    /// `f`: big-endian IEEE 754 float32
    FloatHandler, tag::FLOAT, Float, read_f32, put_f32
);
scalar_handler!(
    /// `h`: big-endian int64
    LongHandler, tag::LONG, Long, read_i64, put_i64
);
scalar_handler!(
    /// `d`: big-endian IEEE 754 float64
    DoubleHandler, tag::DOUBLE, Double, read_f64, put_f64
);

/// `s`: NUL terminated, 4-byte padded string
#[derive(Debug, Clone, Copy, Default)]
pub struct StringHandler;

impl ArgumentHandler for StringHandler {
    fn tag(&self) -> char {
        tag::STRING
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::String(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::String(input.read_str()?.to_string()))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::String(s) => wire::put_padded_str(buf, s),
            other => Err(mismatch(tag::STRING, other)),
        }
    }
}

/// `S`: symbol, same layout as `s`
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolHandler;

impl ArgumentHandler for SymbolHandler {
    fn tag(&self) -> char {
        tag::SYMBOL
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Symbol(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Symbol(input.read_str()?.to_string()))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Symbol(s) => wire::put_padded_str(buf, s),
            other => Err(mismatch(tag::SYMBOL, other)),
        }
    }
}

/// `b`: int32 size followed by that many bytes, padded
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobHandler;

impl ArgumentHandler for BlobHandler {
    fn tag(&self) -> char {
        tag::BLOB
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Blob(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Blob(input.read_blob()?))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Blob(data) => wire::put_blob(buf, data),
            other => Err(mismatch(tag::BLOB, other)),
        }
    }
}

/// `t`: 64-bit NTP time tag
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeTagHandler;

impl ArgumentHandler for TimeTagHandler {
    fn tag(&self) -> char {
        tag::TIME_TAG
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::TimeTag(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::TimeTag(TimeTag::from_raw(input.read_u64()?)))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::TimeTag(t) => {
                buf.put_u64(t.raw());
                Ok(())
            }
            other => Err(mismatch(tag::TIME_TAG, other)),
        }
    }
}

/// `T` / `F`: the value lives in the tag, no payload
#[derive(Debug, Clone, Copy)]
pub struct BoolHandler {
    value: bool,
}

impl BoolHandler {
    pub const TRUE: BoolHandler = BoolHandler { value: true };
    pub const FALSE: BoolHandler = BoolHandler { value: false };
}

impl ArgumentHandler for BoolHandler {
    fn tag(&self) -> char {
        if self.value {
            tag::TRUE
        } else {
            tag::FALSE
        }
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Bool(v) if *v == self.value)
    }

    fn decode(&self, _input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Bool(self.value))
    }

    fn encode(
        &self,
        argument: &Argument,
        _buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        if self.accepts(argument) {
            Ok(())
        } else {
            Err(mismatch(self.tag(), argument))
        }
    }
}

/// `N`
#[derive(Debug, Clone, Copy, Default)]
pub struct NilHandler;

impl ArgumentHandler for NilHandler {
    fn tag(&self) -> char {
        tag::NIL
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Nil)
    }

    fn decode(&self, _input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Nil)
    }

    fn encode(
        &self,
        argument: &Argument,
        _buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Nil => Ok(()),
            other => Err(mismatch(tag::NIL, other)),
        }
    }
}

/// `I`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpulseHandler;

impl ArgumentHandler for ImpulseHandler {
    fn tag(&self) -> char {
        tag::IMPULSE
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Impulse)
    }

    fn decode(&self, _input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Impulse)
    }

    fn encode(
        &self,
        argument: &Argument,
        _buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Impulse => Ok(()),
            other => Err(mismatch(tag::IMPULSE, other)),
        }
    }
}

/// `c`: one ASCII byte in the first byte of a 4-byte slot
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHandler;

impl ArgumentHandler for CharHandler {
    fn tag(&self) -> char {
        tag::CHAR
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Char(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        let [c, ..] = input.read_array::<4>()?;
        if !c.is_ascii() {
            return Err(ParseErrorKind::InvalidArgument {
                tag: tag::CHAR,
                reason: format!("0x{c:02x} is not ASCII"),
            });
        }
        Ok(Argument::Char(c))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Char(c) => {
                buf.put_slice(&[*c, 0, 0, 0]);
                Ok(())
            }
            other => Err(mismatch(tag::CHAR, other)),
        }
    }
}

/// `r`: 32-bit RGBA color
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorHandler;

impl ArgumentHandler for ColorHandler {
    fn tag(&self) -> char {
        tag::COLOR
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Color(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Color(Color::from_bytes(input.read_array()?)))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Color(c) => {
                buf.put_slice(&c.to_bytes());
                Ok(())
            }
            other => Err(mismatch(tag::COLOR, other)),
        }
    }
}

/// `m`: 4-byte MIDI message
#[derive(Debug, Clone, Copy, Default)]
pub struct MidiHandler;

impl ArgumentHandler for MidiHandler {
    fn tag(&self) -> char {
        tag::MIDI
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Midi(_))
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        Ok(Argument::Midi(MidiMessage::from_bytes(input.read_array()?)))
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Midi(m) => {
                buf.put_slice(&m.to_bytes());
                Ok(())
            }
            other => Err(mismatch(tag::MIDI, other)),
        }
    }
}

/// Extension type with a fixed-size payload, surfaced as
/// [`Argument::Custom`]. The payload is zero padded to 4-byte alignment.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthHandler {
    tag: char,
    width: usize,
}

impl FixedWidthHandler {
    pub const fn new(tag: char, width: usize) -> Self {
        Self { tag, width }
    }

    pub const fn width(&self) -> usize {
        self.width
    }
}

impl ArgumentHandler for FixedWidthHandler {
    fn tag(&self) -> char {
        self.tag
    }

    fn accepts(&self, argument: &Argument) -> bool {
        matches!(argument, Argument::Custom { tag, data } if *tag == self.tag && data.len() == self.width)
    }

    fn decode(&self, input: &mut Input<'_>) -> std::result::Result<Argument, ParseErrorKind> {
        let data = input.read_padded(self.width)?;
        Ok(Argument::Custom {
            tag: self.tag,
            data: Bytes::copy_from_slice(data),
        })
    }

    fn encode(
        &self,
        argument: &Argument,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), SerializeError> {
        match argument {
            Argument::Custom { data, .. } if self.accepts(argument) => {
                wire::put_padded(buf, data);
                Ok(())
            }
            other => Err(mismatch(self.tag, other)),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Tag-indexed set of argument handlers.
///
/// Built once at startup and shared read-only (usually behind an `Arc`)
/// by parsers and serializers.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    handlers: HashMap<char, Arc<dyn ArgumentHandler>>,
}

impl TypeRegistry {
    /// Registry with no handlers at all
    pub fn new() -> Self {
        Self::default()
    }

    /// The four types every OSC 1.0 implementation must support: `i f s b`
    pub fn minimal() -> Self {
        let mut registry = Self::new();
        registry.insert(Arc::new(IntHandler));
        registry.insert(Arc::new(FloatHandler));
        registry.insert(Arc::new(StringHandler));
        registry.insert(Arc::new(BlobHandler));
        registry
    }

    /// All built-in types: `i f s b h d t T F N I c r m S u`
    pub fn standard() -> Self {
        let mut registry = Self::minimal();
        registry.insert(Arc::new(LongHandler));
        registry.insert(Arc::new(DoubleHandler));
        registry.insert(Arc::new(TimeTagHandler));
        registry.insert(Arc::new(BoolHandler::TRUE));
        registry.insert(Arc::new(BoolHandler::FALSE));
        registry.insert(Arc::new(NilHandler));
        registry.insert(Arc::new(ImpulseHandler));
        registry.insert(Arc::new(CharHandler));
        registry.insert(Arc::new(ColorHandler));
        registry.insert(Arc::new(MidiHandler));
        registry.insert(Arc::new(SymbolHandler));
        registry.insert(Arc::new(UnsignedHandler));
        registry
    }

    fn insert(&mut self, handler: Arc<dyn ArgumentHandler>) {
        self.handlers.insert(handler.tag(), handler);
    }

    /// Register a handler under its own tag.
    ///
    /// Fails if the tag is taken or is one of the structural characters
    /// `,` `[` `]`.
    pub fn register(&mut self, handler: impl ArgumentHandler + 'static) -> Result<()> {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn ArgumentHandler>) -> Result<()> {
        let tag = handler.tag();
        if tag == ',' || tag == TYPE_ARRAY_BEGIN || tag == TYPE_ARRAY_END {
            return Err(Error::ReservedType(tag));
        }
        if self.handlers.contains_key(&tag) {
            return Err(Error::DuplicateType(tag));
        }
        self.insert(handler);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, handler: impl ArgumentHandler + 'static) -> Result<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Drop the handler for `tag`, if any
    pub fn without(mut self, tag: char) -> Self {
        self.handlers.remove(&tag);
        self
    }

    pub fn get(&self, tag: char) -> Option<&Arc<dyn ArgumentHandler>> {
        self.handlers.get(&tag)
    }

    pub fn handler_for(
        &self,
        tag: char,
    ) -> std::result::Result<&dyn ArgumentHandler, UnknownTypeError> {
        self.handlers
            .get(&tag)
            .map(|h| h.as_ref())
            .ok_or(UnknownTypeError { tag })
    }

    pub fn contains(&self, tag: char) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Registered tags in ascending order
    pub fn tags(&self) -> Vec<char> {
        let mut tags: Vec<char> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: String = self.tags().into_iter().collect();
        f.debug_struct("TypeRegistry").field("tags", &tags).finish()
    }
}
