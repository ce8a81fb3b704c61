//! OSC packet model
//!
//! A [`Packet`] is either a [`Message`] (address plus typed arguments) or a
//! [`Bundle`] (time tag plus nested packets).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::time::TimeTag;

/// Opening bracket of an array in a type tag string
pub const TYPE_ARRAY_BEGIN: char = '[';

/// Closing bracket of an array in a type tag string
pub const TYPE_ARRAY_END: char = ']';

/// Type tag characters of the built-in argument types
pub mod tag {
    pub const INT: char = 'i';
    pub const UNSIGNED: char = 'u';
    pub const FLOAT: char = 'f';
    pub const STRING: char = 's';
    pub const BLOB: char = 'b';
    pub const LONG: char = 'h';
    pub const DOUBLE: char = 'd';
    pub const TIME_TAG: char = 't';
    pub const TRUE: char = 'T';
    pub const FALSE: char = 'F';
    pub const NIL: char = 'N';
    pub const IMPULSE: char = 'I';
    pub const CHAR: char = 'c';
    pub const COLOR: char = 'r';
    pub const MIDI: char = 'm';
    pub const SYMBOL: char = 'S';
}

/// 32-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn to_bytes(&self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// 4-byte MIDI message: port id, status byte, two data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MidiMessage {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub const fn new(port: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port,
            status,
            data1,
            data2,
        }
    }

    pub const fn to_bytes(&self) -> [u8; 4] {
        [self.port, self.status, self.data1, self.data2]
    }

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// A single OSC argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Argument {
    /// `i`: 32-bit signed integer
    Int(i32),
    /// `u`: 32-bit unsigned integer
    Unsigned(u32),
    /// `f`: 32-bit IEEE 754 float
    Float(f32),
    /// `s`: NUL terminated string
    String(String),
    /// `b`: length-prefixed binary blob
    Blob(Bytes),
    /// `h`: 64-bit signed integer
    Long(i64),
    /// `d`: 64-bit IEEE 754 float
    Double(f64),
    /// `t`: time tag
    TimeTag(TimeTag),
    /// `T` / `F`: carried entirely by the type tag
    Bool(bool),
    /// `N`
    Nil,
    /// `I`: "bang", no payload
    Impulse,
    /// `c`: single ASCII character
    Char(u8),
    /// `r`
    Color(Color),
    /// `m`
    Midi(MidiMessage),
    /// `S`: alternate string representation
    Symbol(String),
    /// `[...]`: nested argument list, purely structural in the type tags
    Array(Vec<Argument>),
    /// Extension type decoded by a registered handler
    Custom { tag: char, data: Bytes },
}

impl Argument {
    /// Type tag this argument serializes under, `None` for arrays
    pub fn type_tag(&self) -> Option<char> {
        let tag = match self {
            Argument::Int(_) => tag::INT,
            Argument::Unsigned(_) => tag::UNSIGNED,
            Argument::Float(_) => tag::FLOAT,
            Argument::String(_) => tag::STRING,
            Argument::Blob(_) => tag::BLOB,
            Argument::Long(_) => tag::LONG,
            Argument::Double(_) => tag::DOUBLE,
            Argument::TimeTag(_) => tag::TIME_TAG,
            Argument::Bool(true) => tag::TRUE,
            Argument::Bool(false) => tag::FALSE,
            Argument::Nil => tag::NIL,
            Argument::Impulse => tag::IMPULSE,
            Argument::Char(_) => tag::CHAR,
            Argument::Color(_) => tag::COLOR,
            Argument::Midi(_) => tag::MIDI,
            Argument::Symbol(_) => tag::SYMBOL,
            Argument::Custom { tag, .. } => *tag,
            Argument::Array(_) => return None,
        };
        Some(tag)
    }

    /// Name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Argument::Int(_) => "int32",
            Argument::Unsigned(_) => "uint32",
            Argument::Float(_) => "float32",
            Argument::String(_) => "string",
            Argument::Blob(_) => "blob",
            Argument::Long(_) => "int64",
            Argument::Double(_) => "float64",
            Argument::TimeTag(_) => "time tag",
            Argument::Bool(_) => "bool",
            Argument::Nil => "nil",
            Argument::Impulse => "impulse",
            Argument::Char(_) => "char",
            Argument::Color(_) => "color",
            Argument::Midi(_) => "midi",
            Argument::Symbol(_) => "symbol",
            Argument::Array(_) => "array",
            Argument::Custom { .. } => "custom",
        }
    }

    /// Append this argument's type tags (arrays included) to `out`
    pub fn write_type_tags(&self, out: &mut String) {
        match self {
            Argument::Array(items) => {
                out.push(TYPE_ARRAY_BEGIN);
                for item in items {
                    item.write_type_tags(out);
                }
                out.push(TYPE_ARRAY_END);
            }
            other => {
                if let Some(tag) = other.type_tag() {
                    out.push(tag);
                }
            }
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Argument::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u32> {
        match self {
            Argument::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Argument::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) | Argument::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Argument::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Argument]> {
        match self {
            Argument::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<u32> for Argument {
    fn from(v: u32) -> Self {
        Argument::Unsigned(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl From<i64> for Argument {
    fn from(v: i64) -> Self {
        Argument::Long(v)
    }
}

impl From<f64> for Argument {
    fn from(v: f64) -> Self {
        Argument::Double(v)
    }
}

impl From<bool> for Argument {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::String(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::String(v)
    }
}

impl From<Bytes> for Argument {
    fn from(v: Bytes) -> Self {
        Argument::Blob(v)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(v: Vec<u8>) -> Self {
        Argument::Blob(Bytes::from(v))
    }
}

impl From<TimeTag> for Argument {
    fn from(v: TimeTag) -> Self {
        Argument::TimeTag(v)
    }
}

impl From<Color> for Argument {
    fn from(v: Color) -> Self {
        Argument::Color(v)
    }
}

impl From<MidiMessage> for Argument {
    fn from(v: MidiMessage) -> Self {
        Argument::Midi(v)
    }
}

impl From<Vec<Argument>> for Argument {
    fn from(v: Vec<Argument>) -> Self {
        Argument::Array(v)
    }
}

/// Metadata attached to a message on its way through the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    type_tags: String,
}

impl MessageInfo {
    pub fn new(type_tags: impl Into<String>) -> Self {
        Self {
            type_tags: type_tags.into(),
        }
    }

    /// Type tags without the leading `,`
    pub fn type_tags(&self) -> &str {
        &self.type_tags
    }
}

/// An OSC message
///
/// Equality compares address and arguments only; the attached
/// [`MessageInfo`] is derived data. Arguments are only reachable through
/// accessors so that any mutation drops the info along with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub address: String,
    #[serde(default)]
    arguments: Vec<Argument>,
    #[serde(skip)]
    info: Option<MessageInfo>,
}

impl Message {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            arguments: Vec::new(),
            info: None,
        }
    }

    pub fn with_arguments(address: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            address: address.into(),
            arguments,
            info: None,
        }
    }

    /// Builder-style argument append
    pub fn arg(mut self, argument: impl Into<Argument>) -> Self {
        self.push(argument);
        self
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Mutable access to the arguments; clears the attached info
    pub fn arguments_mut(&mut self) -> &mut Vec<Argument> {
        self.info = None;
        &mut self.arguments
    }

    pub fn into_arguments(self) -> Vec<Argument> {
        self.arguments
    }

    pub fn push(&mut self, argument: impl Into<Argument>) {
        self.arguments_mut().push(argument.into());
    }

    pub fn info(&self) -> Option<&MessageInfo> {
        self.info.as_ref()
    }

    pub fn set_info(&mut self, info: MessageInfo) {
        self.info = Some(info);
    }

    pub fn with_info(mut self, info: MessageInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Type tags of the arguments (no leading `,`), taken from the attached
    /// info when present, computed from the arguments otherwise.
    pub fn type_tags(&self) -> Cow<'_, str> {
        match &self.info {
            Some(info) => Cow::Borrowed(info.type_tags()),
            None => Cow::Owned(type_tags_of(&self.arguments)),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.arguments == other.arguments
    }
}

/// Concatenated type tags of an argument list
pub fn type_tags_of(arguments: &[Argument]) -> String {
    let mut tags = String::with_capacity(arguments.len());
    for argument in arguments {
        argument.write_type_tags(&mut tags);
    }
    tags
}

/// An OSC bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub timetag: TimeTag,
    #[serde(default)]
    pub elements: Vec<Packet>,
}

impl Bundle {
    pub fn new(timetag: TimeTag) -> Self {
        Self {
            timetag,
            elements: Vec::new(),
        }
    }

    /// Bundle carrying the immediate sentinel
    pub fn immediate() -> Self {
        Self::new(TimeTag::IMMEDIATE)
    }

    pub fn with_elements(timetag: TimeTag, elements: Vec<Packet>) -> Self {
        Self { timetag, elements }
    }

    /// Builder-style element append
    pub fn packet(mut self, packet: impl Into<Packet>) -> Self {
        self.elements.push(packet.into());
        self
    }

    pub fn push(&mut self, packet: impl Into<Packet>) {
        self.elements.push(packet.into());
    }
}

/// An OSC packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packet {
    Message(Message),
    Bundle(Bundle),
}

impl Packet {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Packet::Message(m) => Some(m),
            Packet::Bundle(_) => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            Packet::Bundle(b) => Some(b),
            Packet::Message(_) => None,
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Packet::Bundle(_))
    }
}

impl From<Message> for Packet {
    fn from(m: Message) -> Self {
        Packet::Message(m)
    }
}

impl From<Bundle> for Packet {
    fn from(b: Bundle) -> Self {
        Packet::Bundle(b)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ,{}", self.address, self.type_tags())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags_nested() {
        let msg = Message::new("/mixed")
            .arg("first")
            .arg(vec![Argument::Int(1), Argument::Array(vec![Argument::Float(1.0)])])
            .arg(true)
            .arg(Argument::Nil);
        assert_eq!(msg.type_tags(), "s[i[f]]TN");
    }

    #[test]
    fn test_info_preferred_over_arguments() {
        let msg = Message::new("/x").arg(1).with_info(MessageInfo::new("f"));
        assert_eq!(msg.type_tags(), "f");
    }

    #[test]
    fn test_push_invalidates_info() {
        let mut msg = Message::new("/x").with_info(MessageInfo::new(""));
        msg.push(1.5f32);
        assert!(msg.info().is_none());
        assert_eq!(msg.type_tags(), "f");
    }

    #[test]
    fn test_arguments_mut_invalidates_info() {
        let mut msg = Message::new("/x").arg(1).with_info(MessageInfo::new("i"));
        msg.arguments_mut()[0] = Argument::Float(0.5);
        assert!(msg.info().is_none());
        assert_eq!(msg.type_tags(), "f");

        msg.set_info(MessageInfo::new("f"));
        msg.arguments_mut().clear();
        assert_eq!(msg.type_tags(), "");
    }

    #[test]
    fn test_unsigned_argument() {
        let arg = Argument::from(u32::MAX);
        assert_eq!(arg.type_tag(), Some(tag::UNSIGNED));
        assert_eq!(arg.kind(), "uint32");
        assert_eq!(arg.as_unsigned(), Some(u32::MAX));
        assert_eq!(Argument::Int(1).as_unsigned(), None);
    }

    #[test]
    fn test_equality_ignores_info() {
        let a = Message::new("/a").arg(1);
        let b = a.clone().with_info(MessageInfo::new("i"));
        assert_eq!(a, b);
    }
}
