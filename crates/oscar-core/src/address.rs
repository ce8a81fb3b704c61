//! Address validation and OSC address pattern matching
//!
//! Addresses are `/`-separated paths:
//! ```text
//! /mixer/channel/3/fader
//! ```
//!
//! Patterns use the OSC glob dialect, applied per path segment:
//! - `?` matches any single character
//! - `*` matches any run of characters within a segment
//! - `[abc]`, `[a-z]`, `[!a-z]` match one character from (or not from) a set
//! - `{foo,bar}` matches any of the listed strings
//!
//! plus the OSC 1.1 path-traversal wildcard `//`, which matches any number
//! of whole segments (including none).

use std::fmt;
use std::hash::{Hash, Hasher};

/// Characters an address may not contain
const RESERVED_CHARS: &[char] = &[' ', '#', '*', ',', '?', '[', ']', '{', '}', '\0'];

/// Whether `address` is a valid OSC message address (not a pattern).
///
/// It must start with `/`, contain no pattern or reserved characters and no
/// empty interior segment. The root address `/` is valid.
pub fn is_valid_address(address: &str) -> bool {
    address.starts_with('/') && !address.contains("//") && !address.contains(RESERVED_CHARS)
}

/// Split an address or pattern into segments, dropping the empty part
/// produced by a leading and by a trailing `/`.
///
/// `"/hello//world/"` becomes `["hello", "", "world"]`; remaining empty
/// parts are path-traversal wildcards.
pub fn split_parts(address: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = address.split('/').collect();
    if address.starts_with('/') {
        parts.remove(0);
    }
    if address.ends_with('/') {
        parts.pop();
    }
    parts
}

/// A pre-split OSC address pattern
#[derive(Clone)]
pub struct AddressPattern {
    source: String,
    parts: Vec<Vec<char>>,
}

impl AddressPattern {
    /// Compile a pattern. Any string is accepted; malformed constructs
    /// (an unterminated `[` or `{`) simply never match.
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let parts = split_parts(&source)
            .into_iter()
            .map(|part| part.chars().collect())
            .collect();
        Self { source, parts }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains anything but literal segments
    pub fn is_pattern(&self) -> bool {
        self.parts.iter().any(|part| {
            part.is_empty() || part.iter().any(|c| matches!(c, '*' | '?' | '[' | '{'))
        })
    }

    pub fn matches(&self, address: &str) -> bool {
        let address: Vec<Vec<char>> = split_parts(address)
            .into_iter()
            .map(|part| part.chars().collect())
            .collect();
        match_path(&self.parts, 0, &address, 0)
    }
}

impl PartialEq for AddressPattern {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for AddressPattern {}

impl Hash for AddressPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl fmt::Debug for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddressPattern").field(&self.source).finish()
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for AddressPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AddressPattern {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// One-shot pattern match
pub fn pattern_match(pattern: &str, address: &str) -> bool {
    AddressPattern::new(pattern).matches(address)
}

/// Match a single segment (no `/` handling) against a segment pattern
pub fn match_segment(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    match_chars(&text, &pattern)
}

/// Path-level matcher. Empty pattern parts are path-traversal wildcards.
fn match_path(pattern: &[Vec<char>], mut pi: usize, address: &[Vec<char>], mut ai: usize) -> bool {
    while pi < pattern.len() {
        let mut traversal = false;
        while pi < pattern.len() && pattern[pi].is_empty() {
            pi += 1;
            traversal = true;
        }

        if traversal {
            if pi == pattern.len() {
                return true;
            }
            while ai < address.len() {
                if match_chars(&address[ai], &pattern[pi])
                    && match_path(pattern, pi + 1, address, ai + 1)
                {
                    return true;
                }
                ai += 1;
            }
            return false;
        }

        if ai == address.len() || !match_chars(&address[ai], &pattern[pi]) {
            return false;
        }
        ai += 1;
        pi += 1;
    }

    ai == address.len()
}

/// Segment-level matcher
fn match_chars(s: &[char], p: &[char]) -> bool {
    let mut si = 0;
    let mut pi = 0;

    while pi < p.len() {
        match p[pi] {
            '*' => {
                while pi < p.len() && p[pi] == '*' {
                    pi += 1;
                }
                if pi == p.len() {
                    return true;
                }
                // A literal after the star must appear somewhere; jump to it
                if !matches!(p[pi], '?' | '[' | '{') {
                    while si < s.len() && s[si] != p[pi] {
                        si += 1;
                    }
                }
                while si <= s.len() {
                    if match_chars(&s[si..], &p[pi..]) {
                        return true;
                    }
                    si += 1;
                }
                return false;
            }
            '?' => {
                if si == s.len() {
                    return false;
                }
                si += 1;
                pi += 1;
            }
            '[' => {
                if si == s.len() {
                    return false;
                }
                match match_class(&p[pi + 1..], s[si]) {
                    Some((true, consumed)) => {
                        si += 1;
                        pi += 1 + consumed;
                    }
                    _ => return false,
                }
            }
            '{' => {
                let body = &p[pi + 1..];
                let Some(close) = body.iter().position(|&c| c == '}') else {
                    return false;
                };
                let rest = &body[close + 1..];
                return body[..close].split(|&c| c == ',').any(|alternative| {
                    s[si..].starts_with(alternative)
                        && match_chars(&s[si + alternative.len()..], rest)
                });
            }
            c => {
                if si == s.len() || s[si] != c {
                    return false;
                }
                si += 1;
                pi += 1;
            }
        }
    }

    si == s.len()
}

/// Evaluate a character class against `ch`.
///
/// `class` starts right after the opening `[`. Returns whether `ch` is
/// accepted and how many pattern characters the class used, closing `]`
/// included, or `None` if the class is never closed.
///
/// Ranges are inclusive at both ends; a reversed range `z-a` contains only
/// its two endpoints. `]` as the first member and `-` anywhere it cannot
/// form a range are literals. `c-]` is the open range of everything `>= c`
/// and also closes the class.
fn match_class(class: &[char], ch: char) -> Option<(bool, usize)> {
    let negate = class.first() == Some(&'!');
    let mut i = usize::from(negate);
    let mut first = true;
    let mut found = false;

    loop {
        let c = *class.get(i)?;
        if c == ']' && !first {
            i += 1;
            break;
        }
        first = false;

        if class.get(i + 1) == Some(&'-') {
            let end = *class.get(i + 2)?;
            i += 3;
            if end == ']' {
                found |= ch >= c;
                break;
            }
            found |= ch == c || ch == end || (c < ch && ch < end);
        } else {
            found |= ch == c;
            i += 1;
        }
    }

    Some((found != negate, i))
}
