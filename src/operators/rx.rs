//! Regular expression operator (@rx).
//!
//! Patterns are compiled with the text engine unless their `\xHH` escapes
//! decode to bytes that are not valid UTF-8, in which case a byte-oriented
//! engine with Unicode disabled is used.

use regex::bytes::RegexBuilder as BytesRegexBuilder;
use regex::{bytes, Regex};
use std::sync::Arc;

use super::traits::{Operator, OperatorOptions};
use crate::engine::TransactionState;
use crate::error::{Error, Result};
use crate::memoize::{BYTE_REGEXES, TEXT_REGEXES};
use crate::transformations::hex_value;

/// Highest capture index stored; the group at this index ends capturing.
const CAPTURE_LIMIT: usize = 9;

#[derive(Debug, Clone)]
enum Engine {
    Text(Arc<Regex>),
    Bytes(Arc<bytes::Regex>),
}

/// Regex operator (@rx).
#[derive(Debug, Clone)]
pub struct RxOperator {
    engine: Engine,
}

impl RxOperator {
    /// Compile `pattern`. `multiline` selects `(?sm)` over `(?s)`.
    pub fn new(pattern: &str, multiline: bool) -> Result<Self> {
        let flags = if multiline { "(?sm)" } else { "(?s)" };
        let data = format!("{}{}", flags, pattern);

        let engine = if matches_arbitrary_bytes(&data) {
            let re = BYTE_REGEXES.get_or_try_insert_with(&data, || {
                BytesRegexBuilder::new(&data).unicode(false).build()
            });
            Engine::Bytes(re.map_err(|e| compile_error(pattern, e))?)
        } else {
            let re = TEXT_REGEXES.get_or_try_insert_with(&data, || Regex::new(&data));
            Engine::Text(re.map_err(|e| compile_error(pattern, e))?)
        };

        Ok(Self { engine })
    }

    /// Factory for the operator registry.
    pub fn from_options(options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self::new(&options.arguments, options.rx_multiline)?))
    }

    /// Whether the byte engine was selected.
    pub fn is_binary(&self) -> bool {
        matches!(self.engine, Engine::Bytes(_))
    }

    fn match_bytes(re: &bytes::Regex, tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        if !tx.capturing() {
            return re.is_match(value);
        }
        let Some(captures) = re.captures(value) else {
            return false;
        };
        for (i, group) in captures.iter().enumerate() {
            if i == CAPTURE_LIMIT {
                break;
            }
            let text = group.map(|m| String::from_utf8_lossy(m.as_bytes())).unwrap_or_default();
            tx.capture_field(i, &text);
        }
        true
    }
}

fn compile_error(pattern: &str, source: regex::Error) -> Error {
    Error::RegexCompile {
        pattern: pattern.to_string(),
        source,
    }
}

impl Operator for RxOperator {
    fn evaluate(&self, tx: &mut dyn TransactionState, value: &str) -> bool {
        let re = match &self.engine {
            Engine::Text(re) => re,
            Engine::Bytes(re) => return Self::match_bytes(re, tx, value.as_bytes()),
        };
        if !tx.capturing() {
            return re.is_match(value);
        }
        let Some(captures) = re.captures(value) else {
            return false;
        };
        for (i, group) in captures.iter().enumerate() {
            if i == CAPTURE_LIMIT {
                break;
            }
            tx.capture_field(i, group.map_or("", |m| m.as_str()));
        }
        true
    }

    fn evaluate_bytes(&self, tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        match &self.engine {
            Engine::Bytes(re) => Self::match_bytes(re, tx, value),
            Engine::Text(_) => self.evaluate(tx, &String::from_utf8_lossy(value)),
        }
    }
}

/// Decode `\xHH` escapes in `expr` and report whether the result is not
/// valid UTF-8.
///
/// Other backslash sequences are copied through unchanged. A backslash with
/// fewer than three characters after it ends the scan.
fn matches_arbitrary_bytes(expr: &str) -> bool {
    let bytes = expr.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c != b'\\' {
            decoded.push(c);
            i += 1;
            continue;
        }
        if i + 3 >= bytes.len() {
            decoded.extend_from_slice(&bytes[i..]);
            break;
        }
        if bytes[i + 1] != b'x' {
            decoded.push(c);
            i += 1;
            continue;
        }
        match (hex_value(bytes[i + 2]), hex_value(bytes[i + 3])) {
            (Some(hi), Some(lo)) => {
                decoded.push(hi << 4 | lo);
                i += 4;
            }
            _ => {
                decoded.push(c);
                i += 1;
            }
        }
    }

    std::str::from_utf8(&decoded).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;

    #[test]
    fn test_rx_simple() {
        let op = RxOperator::new("^admin", true).unwrap();
        let mut tx = TestState::default();
        assert!(op.evaluate(&mut tx, "admin"));
        assert!(!op.evaluate(&mut tx, "user"));
        assert!(!op.is_binary());
    }

    #[test]
    fn test_rx_dot_matches_newline() {
        let op = RxOperator::new("a.b", false).unwrap();
        let mut tx = TestState::default();
        assert!(op.evaluate(&mut tx, "a\nb"));
    }

    #[test]
    fn test_rx_multiline_anchors() {
        let mut tx = TestState::default();
        let legacy = RxOperator::new("^second", true).unwrap();
        assert!(legacy.evaluate(&mut tx, "first\nsecond"));
        let strict = RxOperator::new("^second", false).unwrap();
        assert!(!strict.evaluate(&mut tx, "first\nsecond"));
    }

    #[test]
    fn test_rx_captures() {
        let op = RxOperator::new(r"user=(\w+)", true).unwrap();
        let mut tx = TestState::capturing();
        assert!(op.evaluate(&mut tx, "user=john"));
        assert_eq!(
            tx.captures,
            vec![(0, "user=john".to_string()), (1, "john".to_string())]
        );
    }

    #[test]
    fn test_rx_no_captures_when_not_capturing() {
        let op = RxOperator::new(r"(\d+)", true).unwrap();
        let mut tx = TestState::default();
        assert!(op.evaluate(&mut tx, "42"));
        assert!(tx.captures.is_empty());
    }

    #[test]
    fn test_rx_capture_stops_at_nine() {
        let op = RxOperator::new("(a)(b)(c)(d)(e)(f)(g)(h)(i)(j)(k)", true).unwrap();
        let mut tx = TestState::capturing();
        assert!(op.evaluate(&mut tx, "abcdefghijk"));
        let indexes: Vec<usize> = tx.captures.iter().map(|(i, _)| *i).collect();
        assert_eq!(indexes, (0..=8).collect::<Vec<_>>());
        assert_eq!(tx.captures[8].1, "h");
    }

    #[test]
    fn test_rx_binary_pattern() {
        let op = RxOperator::new(r"\xFF", true).unwrap();
        assert!(op.is_binary());
        let mut tx = TestState::default();
        assert!(op.evaluate_bytes(&mut tx, b"abc\xFFdef"));
        assert!(!op.evaluate_bytes(&mut tx, b"abcdef"));
        assert!(!op.evaluate(&mut tx, "abcdef"));
    }

    #[test]
    fn test_rx_valid_utf8_escape_stays_text() {
        let op = RxOperator::new(r"\x41", true).unwrap();
        assert!(!op.is_binary());
        let mut tx = TestState::default();
        assert!(op.evaluate(&mut tx, "xAx"));
    }

    #[test]
    fn test_rx_text_engine_reads_invalid_utf8_lossily() {
        let op = RxOperator::new("^abc.$", true).unwrap();
        let mut tx = TestState::default();
        assert!(op.evaluate_bytes(&mut tx, b"abc\xFF"));
        assert!(!op.evaluate_bytes(&mut tx, b"xabcx"));
    }

    #[test]
    fn test_rx_is_memoized() {
        let a = RxOperator::new("memo-test-[0-9]+", true).unwrap();
        let b = RxOperator::new("memo-test-[0-9]+", true).unwrap();
        match (&a.engine, &b.engine) {
            (Engine::Text(x), Engine::Text(y)) => assert!(Arc::ptr_eq(x, y)),
            _ => panic!("expected text engines"),
        }
    }

    #[test]
    fn test_rx_invalid_pattern() {
        let err = RxOperator::new("(unclosed", true).unwrap_err();
        assert!(matches!(err, Error::RegexCompile { .. }));
    }

    #[test]
    fn test_matches_arbitrary_bytes() {
        assert!(matches_arbitrary_bytes(r"\xff\xfe"));
        assert!(!matches_arbitrary_bytes(r"\x41\x42"));
        assert!(!matches_arbitrary_bytes(r"\d+\w"));
        assert!(!matches_arbitrary_bytes(r"\xzz"));
        assert!(!matches_arbitrary_bytes(r"ab\x"));
        assert!(!matches_arbitrary_bytes(r"\xc3\xa9"));
    }
}
