//! Message selectors
//!
//! A selector decides whether a message is of interest to a listener. The
//! built-in selectors test the address (OSC pattern or regex) or the type
//! tags (OSC pattern or regex), and [`Selector::and`], [`Selector::or`] and
//! [`Selector::xor`] combine them into arbitrary predicates.
//!
//! Type-tag selectors need the message's type tag string, so they report
//! [`is_info_required`](MessageSelector::is_info_required) and the
//! dispatcher makes sure the message carries a [`MessageInfo`] before they
//! run.
//!
//! [`MessageInfo`]: crate::types::MessageInfo

use regex_lite::Regex;
use std::fmt;
use std::sync::Arc;

use crate::address::{match_segment, AddressPattern};
use crate::types::Message;
use crate::{Error, Result};

/// Predicate over messages
pub trait MessageSelector: Send + Sync + fmt::Debug {
    /// Whether [`matches`](Self::matches) reads the message's type tags
    fn is_info_required(&self) -> bool;

    fn matches(&self, message: &Message) -> bool;
}

/// Compile `source` as a regex anchored at both ends
fn anchored(source: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{source})$"))
        .map_err(|e| Error::InvalidPattern(format!("{source}: {e}")))
}

/// Matches the address against an OSC address pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternAddressSelector {
    pattern: AddressPattern,
}

impl PatternAddressSelector {
    pub fn new(pattern: impl Into<AddressPattern>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &AddressPattern {
        &self.pattern
    }
}

impl MessageSelector for PatternAddressSelector {
    fn is_info_required(&self) -> bool {
        false
    }

    fn matches(&self, message: &Message) -> bool {
        self.pattern.matches(&message.address)
    }
}

/// Matches the whole address against a regular expression
#[derive(Debug, Clone)]
pub struct RegexAddressSelector {
    source: String,
    regex: Regex,
}

impl RegexAddressSelector {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = anchored(&source)?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for RegexAddressSelector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl MessageSelector for RegexAddressSelector {
    fn is_info_required(&self) -> bool {
        false
    }

    fn matches(&self, message: &Message) -> bool {
        self.regex.is_match(&message.address)
    }
}

/// Matches the type tag string (no leading `,`, arrays as `[`/`]`) against
/// a single-segment OSC pattern, e.g. `i*` or `[if]s`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternTypeTagsSelector {
    pattern: String,
}

impl PatternTypeTagsSelector {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl MessageSelector for PatternTypeTagsSelector {
    fn is_info_required(&self) -> bool {
        true
    }

    fn matches(&self, message: &Message) -> bool {
        match_segment(&message.type_tags(), &self.pattern)
    }
}

/// Matches the whole type tag string against a regular expression
#[derive(Debug, Clone)]
pub struct RegexTypeTagsSelector {
    source: String,
    regex: Regex,
}

impl RegexTypeTagsSelector {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = anchored(&source)?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for RegexTypeTagsSelector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl MessageSelector for RegexTypeTagsSelector {
    fn is_info_required(&self) -> bool {
        true
    }

    fn matches(&self, message: &Message) -> bool {
        self.regex.is_match(&message.type_tags())
    }
}

/// How a [`CombinedSelector`] joins its two children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOperator {
    And,
    Or,
    Xor,
}

impl LogicOperator {
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            LogicOperator::And => left && right,
            LogicOperator::Or => left || right,
            LogicOperator::Xor => left != right,
        }
    }
}

/// Two selectors joined by a [`LogicOperator`].
///
/// Both children are always evaluated, so side effects in custom selectors
/// happen regardless of the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSelector {
    operator: LogicOperator,
    left: Box<Selector>,
    right: Box<Selector>,
}

impl CombinedSelector {
    pub fn new(operator: LogicOperator, left: Selector, right: Selector) -> Self {
        Self {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn operator(&self) -> LogicOperator {
        self.operator
    }
}

impl MessageSelector for CombinedSelector {
    fn is_info_required(&self) -> bool {
        self.left.is_info_required() || self.right.is_info_required()
    }

    fn matches(&self, message: &Message) -> bool {
        let left = self.left.matches(message);
        let right = self.right.matches(message);
        self.operator.apply(left, right)
    }
}

/// Any selector
#[derive(Debug, Clone)]
pub enum Selector {
    Address(PatternAddressSelector),
    RegexAddress(RegexAddressSelector),
    TypeTags(PatternTypeTagsSelector),
    RegexTypeTags(RegexTypeTagsSelector),
    Combined(CombinedSelector),
    Custom(Arc<dyn MessageSelector>),
}

impl Selector {
    /// Address matching an OSC pattern
    pub fn address(pattern: impl Into<AddressPattern>) -> Self {
        Selector::Address(PatternAddressSelector::new(pattern))
    }

    /// Address matching a regular expression
    pub fn regex_address(regex: &str) -> Result<Self> {
        RegexAddressSelector::new(regex).map(Selector::RegexAddress)
    }

    /// Type tags matching an OSC pattern
    pub fn type_tags(pattern: impl Into<String>) -> Self {
        Selector::TypeTags(PatternTypeTagsSelector::new(pattern))
    }

    /// Type tags matching a regular expression
    pub fn regex_type_tags(regex: &str) -> Result<Self> {
        RegexTypeTagsSelector::new(regex).map(Selector::RegexTypeTags)
    }

    pub fn custom(selector: impl MessageSelector + 'static) -> Self {
        Selector::Custom(Arc::new(selector))
    }

    pub fn and(self, other: Selector) -> Self {
        Selector::Combined(CombinedSelector::new(LogicOperator::And, self, other))
    }

    pub fn or(self, other: Selector) -> Self {
        Selector::Combined(CombinedSelector::new(LogicOperator::Or, self, other))
    }

    pub fn xor(self, other: Selector) -> Self {
        Selector::Combined(CombinedSelector::new(LogicOperator::Xor, self, other))
    }
}

impl MessageSelector for Selector {
    fn is_info_required(&self) -> bool {
        match self {
            Selector::Address(s) => s.is_info_required(),
            Selector::RegexAddress(s) => s.is_info_required(),
            Selector::TypeTags(s) => s.is_info_required(),
            Selector::RegexTypeTags(s) => s.is_info_required(),
            Selector::Combined(s) => s.is_info_required(),
            Selector::Custom(s) => s.is_info_required(),
        }
    }

    fn matches(&self, message: &Message) -> bool {
        match self {
            Selector::Address(s) => s.matches(message),
            Selector::RegexAddress(s) => s.matches(message),
            Selector::TypeTags(s) => s.matches(message),
            Selector::RegexTypeTags(s) => s.matches(message),
            Selector::Combined(s) => s.matches(message),
            Selector::Custom(s) => s.matches(message),
        }
    }
}

/// Custom selectors compare by identity, everything else structurally
impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Selector::Address(a), Selector::Address(b)) => a == b,
            (Selector::RegexAddress(a), Selector::RegexAddress(b)) => a == b,
            (Selector::TypeTags(a), Selector::TypeTags(b)) => a == b,
            (Selector::RegexTypeTags(a), Selector::RegexTypeTags(b)) => a == b,
            (Selector::Combined(a), Selector::Combined(b)) => a == b,
            (Selector::Custom(a), Selector::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Selector {
    fn from(pattern: &str) -> Self {
        Selector::address(pattern)
    }
}

impl From<PatternAddressSelector> for Selector {
    fn from(s: PatternAddressSelector) -> Self {
        Selector::Address(s)
    }
}

impl From<CombinedSelector> for Selector {
    fn from(s: CombinedSelector) -> Self {
        Selector::Combined(s)
    }
}

/// Messages whose address matches `address` and whose type tags match
/// `type_tags`, both OSC patterns
pub fn address_and_type_tags(address: &str, type_tags: &str) -> Selector {
    Selector::address(address).and(Selector::type_tags(type_tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_tables() {
        let cases = [(false, false), (false, true), (true, false), (true, true)];
        let and: Vec<bool> = cases.iter().map(|&(l, r)| LogicOperator::And.apply(l, r)).collect();
        let or: Vec<bool> = cases.iter().map(|&(l, r)| LogicOperator::Or.apply(l, r)).collect();
        let xor: Vec<bool> = cases.iter().map(|&(l, r)| LogicOperator::Xor.apply(l, r)).collect();
        assert_eq!(and, vec![false, false, false, true]);
        assert_eq!(or, vec![false, true, true, true]);
        assert_eq!(xor, vec![false, true, true, false]);
    }

    #[test]
    fn test_regex_is_anchored() {
        let selector = Selector::regex_address("/a.*").unwrap();
        assert!(selector.matches(&Message::new("/abc")));
        assert!(!selector.matches(&Message::new("/x/abc")));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            Selector::regex_address("(unclosed"),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_custom_identity() {
        #[derive(Debug)]
        struct Always;
        impl MessageSelector for Always {
            fn is_info_required(&self) -> bool {
                false
            }
            fn matches(&self, _message: &Message) -> bool {
                true
            }
        }

        let a = Selector::custom(Always);
        assert_eq!(a, a.clone());
        assert_ne!(a, Selector::custom(Always));
    }
}
