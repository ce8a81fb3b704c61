//! OSCAR Core
//!
//! Open Sound Control protocol primitives.
//!
//! This crate provides:
//! - The packet model ([`Packet`], [`Message`], [`Bundle`], [`Argument`])
//! - NTP time tags ([`TimeTag`])
//! - The extensible argument type registry ([`TypeRegistry`])
//! - Bit-exact binary encoding/decoding ([`Parser`], [`Serializer`], [`codec`])
//! - Address validation and pattern matching ([`AddressPattern`])
//! - Message selectors and their combinators ([`Selector`])
//!
//! ```
//! use oscar_core::{decode, encode, Message, Packet, Selector, MessageSelector};
//!
//! let packet = Packet::from(Message::new("/mixer/fader/3").arg(0.75f32));
//! let bytes = encode(&packet).unwrap();
//! let decoded = decode(&bytes).unwrap();
//!
//! let selector = Selector::address("/mixer/fader/*");
//! assert!(selector.matches(decoded.as_message().unwrap()));
//! ```

pub mod address;
pub mod argument;
pub mod codec;
pub mod error;
pub mod selector;
pub mod time;
pub mod types;
pub mod wire;

pub use address::{is_valid_address, AddressPattern};
pub use argument::{ArgumentHandler, TypeRegistry};
pub use codec::{decode, encode, Codec, CodecConfig, Parser, Serializer};
pub use error::{Error, ParseError, ParseErrorKind, Result, SerializeError, UnknownTypeError};
pub use selector::{address_and_type_tags, LogicOperator, MessageSelector, Selector};
pub use time::TimeTag;
pub use types::*;

/// OSC protocol version implemented
pub const OSC_VERSION: &str = "1.1";
