//! Validation operators. They match when the input is invalid.

use super::traits::{Operator, OperatorOptions};
use crate::engine::TransactionState;
use crate::error::{Error, Result};

/// `@validateUrlEncoding`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateUrlEncodingOperator;

impl Operator for ValidateUrlEncodingOperator {
    fn evaluate(&self, _tx: &mut dyn TransactionState, value: &str) -> bool {
        !is_valid_url_encoding(value.as_bytes())
    }

    fn evaluate_bytes(&self, _tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        !is_valid_url_encoding(value)
    }
}

/// `@validateUtf8Encoding`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateUtf8EncodingOperator;

impl Operator for ValidateUtf8EncodingOperator {
    fn evaluate(&self, _tx: &mut dyn TransactionState, _value: &str) -> bool {
        false
    }

    fn evaluate_bytes(&self, _tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        std::str::from_utf8(value).is_err()
    }
}

/// `@validateByteRange 9,10,13,32-126`
#[derive(Debug, Clone)]
pub struct ValidateByteRangeOperator {
    allowed: [bool; 256],
}

impl ValidateByteRangeOperator {
    /// Parse a comma-separated list of bytes and ranges.
    pub fn new(spec: &str) -> Result<Self> {
        let invalid = |message: String| Error::parse(message, "@validateByteRange");
        let parse = |s: &str| {
            s.trim()
                .parse::<u8>()
                .map_err(|_| invalid(format!("'{}' is not a byte value", s.trim())))
        };

        let mut allowed = [false; 256];
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (parse(start)?, parse(end)?),
                None => {
                    let b = parse(part)?;
                    (b, b)
                }
            };
            if start > end {
                return Err(invalid(format!("range {} is reversed", part)));
            }
            for b in start..=end {
                allowed[usize::from(b)] = true;
            }
        }
        Ok(Self { allowed })
    }

    /// Registry factory.
    pub fn from_options(options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self::new(&options.arguments)?))
    }
}

impl Operator for ValidateByteRangeOperator {
    fn evaluate(&self, tx: &mut dyn TransactionState, value: &str) -> bool {
        self.evaluate_bytes(tx, value.as_bytes())
    }

    fn evaluate_bytes(&self, _tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        value.iter().any(|&b| !self.allowed[usize::from(b)])
    }
}

/// Check that every `%` is followed by two hex digits.
fn is_valid_url_encoding(s: &[u8]) -> bool {
    let mut i = 0;
    while i < s.len() {
        if s[i] == b'%' {
            match (s.get(i + 1), s.get(i + 2)) {
                (Some(h1), Some(h2)) if h1.is_ascii_hexdigit() && h2.is_ascii_hexdigit() => {
                    i += 3;
                    continue;
                }
                _ => return false,
            }
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;

    #[test]
    fn test_valid_url_encoding() {
        assert!(is_valid_url_encoding(b"hello%20world"));
        assert!(is_valid_url_encoding(b"test%2Fpath"));
        assert!(!is_valid_url_encoding(b"hello%2"));
        assert!(!is_valid_url_encoding(b"hello%GG"));
    }

    #[test]
    fn test_validate_url_encoding_operator() {
        let mut tx = TestState::default();
        assert!(!ValidateUrlEncodingOperator.evaluate(&mut tx, "hello%20world"));
        assert!(ValidateUrlEncodingOperator.evaluate(&mut tx, "hello%2"));
    }

    #[test]
    fn test_validate_utf8() {
        let mut tx = TestState::default();
        assert!(!ValidateUtf8EncodingOperator.evaluate_bytes(&mut tx, "héllo".as_bytes()));
        assert!(ValidateUtf8EncodingOperator.evaluate_bytes(&mut tx, b"\xC0\xAF"));
    }

    #[test]
    fn test_validate_byte_range() {
        let op = ValidateByteRangeOperator::new("9,10,13,32-126").unwrap();
        let mut tx = TestState::default();
        assert!(!op.evaluate(&mut tx, "plain text\r\n"));
        assert!(op.evaluate(&mut tx, "null\0byte"));
        assert!(op.evaluate(&mut tx, "é"));
        assert!(ValidateByteRangeOperator::new("200-100").is_err());
        assert!(ValidateByteRangeOperator::new("300").is_err());
    }
}
