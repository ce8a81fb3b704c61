//! Selector tests

use oscar_core::selector::{
    CombinedSelector, LogicOperator, PatternAddressSelector, PatternTypeTagsSelector,
};
use oscar_core::{address_and_type_tags, codec, Argument, Message, MessageSelector, Packet, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn message(address: &str, arguments: Vec<Argument>) -> Message {
    Message::with_arguments(address, arguments)
}

#[derive(Debug)]
struct Fixed {
    result: bool,
    info: bool,
    calls: Arc<AtomicUsize>,
}

impl Fixed {
    fn new(result: bool, info: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                result,
                info,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl MessageSelector for Fixed {
    fn is_info_required(&self) -> bool {
        self.info
    }

    fn matches(&self, _message: &Message) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
    }
}

#[test]
fn test_address_selector_info_not_required() {
    assert!(!Selector::address("/a").is_info_required());
    assert!(!Selector::regex_address("/a").unwrap().is_info_required());
}

#[test]
fn test_type_tags_selector_info_required() {
    assert!(Selector::type_tags("i").is_info_required());
    assert!(Selector::regex_type_tags("i+").unwrap().is_info_required());
}

#[test]
fn test_pattern_type_tags() {
    let selector = Selector::type_tags("i*");
    assert!(selector.matches(&message("/x", vec![1.into()])));
    assert!(selector.matches(&message("/x", vec![1.into(), "s".into()])));
    assert!(!selector.matches(&message("/x", vec![1.5f32.into()])));
    assert!(!selector.matches(&message("/x", vec![])));
}

#[test]
fn test_type_tags_include_arrays() {
    let msg = message("/x", vec!["a".into(), vec![Argument::Int(1), Argument::Int(2)].into()]);
    assert_eq!(msg.type_tags(), "s[ii]");

    // '[' opens a character class in a pattern, so brackets are matched by '?'
    assert!(Selector::type_tags("s?ii?").matches(&msg));
    assert!(Selector::regex_type_tags(r"s\[i+\]").unwrap().matches(&msg));
}

#[test]
fn test_regex_type_tags() {
    let selector = Selector::regex_type_tags("[if]+").unwrap();
    assert!(selector.matches(&message("/x", vec![1.into(), 2.0f32.into()])));
    assert!(!selector.matches(&message("/x", vec![1.into(), "s".into()])));
}

#[test]
fn test_type_tags_from_wire_info() {
    let bytes = codec::encode(&Packet::from(message("/x", vec![1.into(), true.into()]))).unwrap();
    let decoded = codec::decode(&bytes).unwrap();
    let decoded = decoded.as_message().unwrap();
    assert!(decoded.info().is_some());
    assert!(Selector::type_tags("iT").matches(decoded));
}

#[test]
fn test_combined_truth_tables() {
    let cases = [(false, false), (false, true), (true, false), (true, true)];
    let expected = [
        (LogicOperator::And, [false, false, false, true]),
        (LogicOperator::Or, [false, true, true, true]),
        (LogicOperator::Xor, [false, true, true, false]),
    ];

    let msg = Message::new("/any");
    for (operator, results) in expected {
        for ((left, right), result) in cases.iter().zip(results) {
            let (l, _) = Fixed::new(*left, false);
            let (r, _) = Fixed::new(*right, false);
            let combined = CombinedSelector::new(operator, Selector::custom(l), Selector::custom(r));
            assert_eq!(
                combined.matches(&msg),
                result,
                "{operator:?}({left}, {right})"
            );
        }
    }
}

#[test]
fn test_combined_evaluates_both_children() {
    let (left, left_calls) = Fixed::new(false, false);
    let (right, right_calls) = Fixed::new(true, false);
    let and = Selector::custom(left).and(Selector::custom(right));

    assert!(!and.matches(&Message::new("/x")));
    assert_eq!(left_calls.load(Ordering::SeqCst), 1);
    assert_eq!(right_calls.load(Ordering::SeqCst), 1);

    let (left, left_calls) = Fixed::new(true, false);
    let (right, right_calls) = Fixed::new(false, false);
    let or = Selector::custom(left).or(Selector::custom(right));

    assert!(or.matches(&Message::new("/x")));
    assert_eq!(left_calls.load(Ordering::SeqCst), 1);
    assert_eq!(right_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_combined_info_required_propagates() {
    for (left, right) in [(false, false), (false, true), (true, false), (true, true)] {
        let (l, _) = Fixed::new(true, left);
        let (r, _) = Fixed::new(true, right);
        let combined = Selector::custom(l).xor(Selector::custom(r));
        assert_eq!(combined.is_info_required(), left || right);
    }

    let nested = Selector::address("/a").or(Selector::address("/b").and(Selector::type_tags("f")));
    assert!(nested.is_info_required());
}

#[test]
fn test_address_and_type_tags() {
    let selector = address_and_type_tags("/mixer/*/volume", "f");
    assert!(selector.is_info_required());
    assert!(selector.matches(&message("/mixer/1/volume", vec![0.5f32.into()])));
    assert!(!selector.matches(&message("/mixer/1/volume", vec![1.into()])));
    assert!(!selector.matches(&message("/mixer/1/pan", vec![0.5f32.into()])));
}

#[test]
fn test_selector_equality() {
    assert_eq!(Selector::address("/a/b/"), Selector::address("/a/b"));
    assert_ne!(Selector::address("/a"), Selector::type_tags("/a"));
    assert_eq!(
        Selector::regex_address("/a+").unwrap(),
        Selector::regex_address("/a+").unwrap()
    );
    assert_eq!(
        address_and_type_tags("/a", "i"),
        address_and_type_tags("/a", "i")
    );
    assert_eq!(
        Selector::from(PatternAddressSelector::new("/x")),
        Selector::address("/x")
    );
    assert_eq!(
        PatternTypeTagsSelector::new("if"),
        PatternTypeTagsSelector::new("if")
    );
}
