//! OSC binary codec
//!
//! [`Parser`] turns wire bytes into a [`Packet`] tree and [`Serializer`]
//! does the reverse. Argument payloads are delegated to the handlers in a
//! shared [`TypeRegistry`]; the codec itself only knows the framing:
//!
//! ```text
//! message := padded(address) padded(",tags") payload*
//! bundle  := "#bundle\0" timetag:u64 (size:i32 element)*
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::address::is_valid_address;
use crate::argument::TypeRegistry;
use crate::error::{ParseError, ParseErrorKind, SerializeError};
use crate::time::TimeTag;
use crate::types::{Argument, Bundle, Message, MessageInfo, Packet, TYPE_ARRAY_BEGIN, TYPE_ARRAY_END};
use crate::wire::{self, Input};

/// Header that opens every bundle
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Largest payload of a single UDP datagram over IPv4
pub const DEFAULT_MAX_PACKET_SIZE: usize = 65_507;

/// Default limit for bundles inside bundles, and for arrays inside arrays
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Codec settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Capacity [`Serializer::serialize`] allows for one packet
    pub max_packet_size: usize,
    /// Accept messages that end right after their address (pre-1.0 senders)
    /// as having no arguments
    pub allow_missing_type_tags: bool,
    /// Deepest chain of bundles inside bundles; the outermost bundle is
    /// level 1
    pub max_bundle_depth: usize,
    /// Deepest chain of arrays inside arrays within one message
    pub max_array_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            allow_missing_type_tags: true,
            max_bundle_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_array_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Converts wire bytes into packets
#[derive(Debug, Clone)]
pub struct Parser {
    registry: Arc<TypeRegistry>,
    config: CodecConfig,
}

impl Parser {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: Arc<TypeRegistry>, config: CodecConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Parse one complete packet.
    ///
    /// Parsed messages carry a [`MessageInfo`] with the type tags read from
    /// the wire.
    pub fn parse(&self, data: &[u8]) -> Result<Packet, ParseError> {
        self.parse_packet(data, 0)
            .map_err(|kind| ParseError::new(kind, Bytes::copy_from_slice(data)))
    }

    /// Like [`parse`](Self::parse), reusing the caller's buffer for the error
    pub fn parse_bytes(&self, data: &Bytes) -> Result<Packet, ParseError> {
        self.parse_packet(data, 0)
            .map_err(|kind| ParseError::new(kind, data.clone()))
    }

    /// `depth` counts the bundles enclosing `data`
    fn parse_packet(&self, data: &[u8], depth: usize) -> Result<Packet, ParseErrorKind> {
        if data.is_empty() {
            return Err(ParseErrorKind::Empty);
        }
        if data.len() % 4 != 0 {
            return Err(ParseErrorKind::Unaligned(data.len()));
        }

        if data[0] == b'#' {
            self.parse_bundle(data, depth + 1).map(Packet::Bundle)
        } else {
            self.parse_message(data).map(Packet::Message)
        }
    }

    fn parse_bundle(&self, data: &[u8], depth: usize) -> Result<Bundle, ParseErrorKind> {
        if !data.starts_with(BUNDLE_TAG) {
            return Err(ParseErrorKind::InvalidBundleHeader);
        }
        if depth > self.config.max_bundle_depth {
            return Err(ParseErrorKind::NestingTooDeep(self.config.max_bundle_depth));
        }

        let mut input = Input::new(data);
        input.take(BUNDLE_TAG.len())?;
        let timetag = TimeTag::from_raw(input.read_u64()?);

        let mut elements = Vec::new();
        while !input.is_empty() {
            let len = input.read_i32()?;
            if len <= 0 || len % 4 != 0 {
                return Err(ParseErrorKind::InvalidElementLength(len));
            }
            let element = input.take(len as usize)?;
            elements.push(self.parse_packet(element, depth)?);
        }

        Ok(Bundle::with_elements(timetag, elements))
    }

    fn parse_message(&self, data: &[u8]) -> Result<Message, ParseErrorKind> {
        let mut input = Input::new(data);
        let address = input.read_str()?;
        if !address.starts_with('/') {
            return Err(ParseErrorKind::InvalidAddress(address.to_string()));
        }

        let type_tags = match input.peek_u8() {
            None if self.config.allow_missing_type_tags => "",
            None => return Err(ParseErrorKind::MissingTypeTags),
            Some(b',') => &input.read_str()?[1..],
            Some(other) => return Err(ParseErrorKind::MissingTypeTagSeparator(other)),
        };

        let arguments = self.parse_arguments(type_tags, &mut input)?;
        if !input.is_empty() {
            return Err(ParseErrorKind::TrailingBytes(input.remaining()));
        }

        Ok(Message::with_arguments(address, arguments).with_info(MessageInfo::new(type_tags)))
    }

    fn parse_arguments(
        &self,
        type_tags: &str,
        input: &mut Input<'_>,
    ) -> Result<Vec<Argument>, ParseErrorKind> {
        let unbalanced = || ParseErrorKind::UnbalancedArray(type_tags.to_string());

        // One frame per open '[', innermost last
        let mut stack: Vec<Vec<Argument>> = vec![Vec::new()];
        for tag in type_tags.chars() {
            match tag {
                TYPE_ARRAY_BEGIN => {
                    if stack.len() > self.config.max_array_depth {
                        return Err(ParseErrorKind::NestingTooDeep(self.config.max_array_depth));
                    }
                    stack.push(Vec::new());
                }
                TYPE_ARRAY_END => {
                    if stack.len() < 2 {
                        return Err(unbalanced());
                    }
                    let items = stack.pop().ok_or_else(unbalanced)?;
                    stack
                        .last_mut()
                        .ok_or_else(unbalanced)?
                        .push(Argument::Array(items));
                }
                tag => {
                    let argument = self.registry.handler_for(tag)?.decode(input)?;
                    stack.last_mut().ok_or_else(unbalanced)?.push(argument);
                }
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(arguments), true) => Ok(arguments),
            _ => Err(unbalanced()),
        }
    }
}

// ============================================================================
// SERIALIZER
// ============================================================================

/// Converts packets into wire bytes
#[derive(Debug, Clone)]
pub struct Serializer {
    registry: Arc<TypeRegistry>,
    config: CodecConfig,
}

impl Serializer {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: Arc<TypeRegistry>, config: CodecConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Encode a packet into a fresh buffer of at most `max_packet_size` bytes
    pub fn serialize(&self, packet: &Packet) -> Result<Bytes, SerializeError> {
        let mut buf = BytesMut::with_capacity(256);
        self.write_packet(packet, &mut buf, 0)?;
        if buf.len() > self.config.max_packet_size {
            return Err(SerializeError::BufferOverrun {
                needed: buf.len(),
                available: self.config.max_packet_size,
            });
        }
        Ok(buf.freeze())
    }

    /// Encode a packet into `sink`, returning the number of bytes written.
    ///
    /// If the packet does not fit, nothing is written.
    pub fn serialize_into<B: BufMut>(
        &self,
        packet: &Packet,
        sink: &mut B,
    ) -> Result<usize, SerializeError> {
        let mut buf = BytesMut::with_capacity(256);
        self.write_packet(packet, &mut buf, 0)?;
        let available = sink.remaining_mut();
        if buf.len() > available {
            return Err(SerializeError::BufferOverrun {
                needed: buf.len(),
                available,
            });
        }
        sink.put_slice(&buf);
        Ok(buf.len())
    }

    /// Type tags (without the leading `,`) the arguments would be written
    /// with, checked against the registry.
    pub fn type_tags(&self, arguments: &[Argument]) -> Result<String, SerializeError> {
        let mut tags = String::with_capacity(arguments.len());
        self.collect_type_tags(arguments, &mut tags, 0)?;
        Ok(tags)
    }

    /// [`MessageInfo`] for a message, as a parser would produce it
    pub fn message_info(&self, message: &Message) -> Result<MessageInfo, SerializeError> {
        Ok(MessageInfo::new(self.type_tags(message.arguments())?))
    }

    /// `depth` counts the arrays enclosing `arguments`
    fn collect_type_tags(
        &self,
        arguments: &[Argument],
        out: &mut String,
        depth: usize,
    ) -> Result<(), SerializeError> {
        for argument in arguments {
            match argument {
                Argument::Array(items) => {
                    if depth >= self.config.max_array_depth {
                        return Err(SerializeError::NestingTooDeep(self.config.max_array_depth));
                    }
                    out.push(TYPE_ARRAY_BEGIN);
                    self.collect_type_tags(items, out, depth + 1)?;
                    out.push(TYPE_ARRAY_END);
                }
                argument => {
                    let tag = self.checked_tag(argument)?;
                    out.push(tag);
                }
            }
        }
        Ok(())
    }

    fn checked_tag(&self, argument: &Argument) -> Result<char, SerializeError> {
        let tag = argument.type_tag().unwrap_or(TYPE_ARRAY_BEGIN);
        let handler = self.registry.handler_for(tag)?;
        if !handler.accepts(argument) {
            return Err(SerializeError::TypeMismatch {
                tag,
                found: argument.kind(),
            });
        }
        Ok(tag)
    }

    fn write_packet(
        &self,
        packet: &Packet,
        buf: &mut BytesMut,
        depth: usize,
    ) -> Result<(), SerializeError> {
        match packet {
            Packet::Message(message) => self.write_message(message, buf),
            Packet::Bundle(bundle) => self.write_bundle(bundle, buf, depth + 1),
        }
    }

    fn write_bundle(
        &self,
        bundle: &Bundle,
        buf: &mut BytesMut,
        depth: usize,
    ) -> Result<(), SerializeError> {
        if depth > self.config.max_bundle_depth {
            return Err(SerializeError::NestingTooDeep(self.config.max_bundle_depth));
        }
        buf.put_slice(BUNDLE_TAG);
        buf.put_u64(bundle.timetag.raw());

        for element in &bundle.elements {
            // Reserve the size slot and patch it once the element is written
            let start = buf.len();
            buf.put_i32(0);
            self.write_packet(element, buf, depth)?;
            let len = buf.len() - start - 4;
            let len = i32::try_from(len).map_err(|_| SerializeError::TooLarge(len))?;
            buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
        }
        Ok(())
    }

    fn write_message(&self, message: &Message, buf: &mut BytesMut) -> Result<(), SerializeError> {
        if !is_valid_address(&message.address) {
            return Err(SerializeError::InvalidAddress(message.address.clone()));
        }
        wire::put_padded_str(buf, &message.address)?;

        let arguments = message.arguments();
        let mut tags = String::with_capacity(arguments.len() + 1);
        tags.push(',');
        self.collect_type_tags(arguments, &mut tags, 0)?;
        wire::put_padded_str(buf, &tags)?;

        self.write_arguments(arguments, buf)
    }

    fn write_arguments(
        &self,
        arguments: &[Argument],
        buf: &mut BytesMut,
    ) -> Result<(), SerializeError> {
        for argument in arguments {
            match argument {
                Argument::Array(items) => self.write_arguments(items, buf)?,
                argument => {
                    let tag = self.checked_tag(argument)?;
                    self.registry.handler_for(tag)?.encode(argument, buf)?;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// CODEC
// ============================================================================

/// Parser and serializer sharing one registry and configuration
#[derive(Debug, Clone)]
pub struct Codec {
    parser: Parser,
    serializer: Serializer,
}

impl Codec {
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: TypeRegistry, config: CodecConfig) -> Self {
        let registry = Arc::new(registry);
        Self {
            parser: Parser::with_config(registry.clone(), config.clone()),
            serializer: Serializer::with_config(registry, config),
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub fn parse(&self, data: &[u8]) -> Result<Packet, ParseError> {
        self.parser.parse(data)
    }

    pub fn serialize(&self, packet: &Packet) -> Result<Bytes, SerializeError> {
        self.serializer.serialize(packet)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(TypeRegistry::standard())
    }
}

fn default_codec() -> &'static Codec {
    static CODEC: OnceLock<Codec> = OnceLock::new();
    CODEC.get_or_init(Codec::default)
}

/// Encode a packet with the standard registry
#[inline]
pub fn encode(packet: &Packet) -> Result<Bytes, SerializeError> {
    default_codec().serialize(packet)
}

/// Decode a packet with the standard registry
#[inline]
pub fn decode(data: &[u8]) -> Result<Packet, ParseError> {
    default_codec().parse(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_message_bytes() {
        let packet = Packet::from(Message::new("/int").arg(99));
        let bytes = encode(&packet).unwrap();
        assert_eq!(
            &bytes[..],
            &[47, 105, 110, 116, 0, 0, 0, 0, 44, 105, 0, 0, 0, 0, 0, 99]
        );
    }

    #[test]
    fn test_parsed_message_has_info() {
        let bytes = encode(&Message::new("/a").arg(1).arg("x").into()).unwrap();
        let packet = decode(&bytes).unwrap();
        let message = packet.as_message().unwrap();
        assert_eq!(message.info().unwrap().type_tags(), "is");
    }

    #[test]
    fn test_missing_type_tags_allowed() {
        let packet = decode(b"/old\0\0\0\0").unwrap();
        let message = packet.as_message().unwrap();
        assert_eq!(message.address, "/old");
        assert!(message.arguments().is_empty());
    }

    #[test]
    fn test_missing_type_tags_rejected() {
        let config = CodecConfig {
            allow_missing_type_tags: false,
            ..Default::default()
        };
        let codec = Codec::with_config(TypeRegistry::standard(), config);
        let err = codec.parse(b"/old\0\0\0\0").unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::MissingTypeTags);
    }

    fn nested_bundle(levels: usize) -> Packet {
        (0..levels).fold(Message::new("/leaf").into(), |inner, _| {
            Bundle::immediate().packet(inner).into()
        })
    }

    #[test]
    fn test_bundle_depth_limit_on_serialize() {
        let config = CodecConfig {
            max_bundle_depth: 4,
            ..Default::default()
        };
        let codec = Codec::with_config(TypeRegistry::standard(), config);
        assert!(codec.serialize(&nested_bundle(4)).is_ok());
        assert_eq!(
            codec.serialize(&nested_bundle(5)).unwrap_err(),
            SerializeError::NestingTooDeep(4)
        );
    }

    #[test]
    fn test_bundle_depth_limit_on_parse() {
        let bytes = encode(&nested_bundle(5)).unwrap();
        let config = CodecConfig {
            max_bundle_depth: 4,
            ..Default::default()
        };
        let codec = Codec::with_config(TypeRegistry::standard(), config);
        let err = codec.parse(&bytes).unwrap_err();
        assert_eq!(err.kind(), &ParseErrorKind::NestingTooDeep(4));
        assert!(decode(&bytes).is_ok());
    }

    #[test]
    fn test_max_packet_size() {
        let config = CodecConfig {
            max_packet_size: 8,
            ..Default::default()
        };
        let codec = Codec::with_config(TypeRegistry::standard(), config);
        let err = codec.serialize(&Message::new("/int").arg(1).into()).unwrap_err();
        assert_eq!(
            err,
            SerializeError::BufferOverrun {
                needed: 16,
                available: 8
            }
        );
    }
}
