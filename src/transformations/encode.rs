//! Encoding and hashing transformations.

use base64::Engine;
use md5::Digest;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;

/// Characters left alone by `urlEncode`.
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `urlEncode`: percent-encode everything except unreserved characters.
pub fn url_encode(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, URL_ENCODE_SET).into()
}

/// `base64Encode`
pub fn base64_encode(input: &str) -> Cow<'_, str> {
    Cow::Owned(base64::engine::general_purpose::STANDARD.encode(input))
}

/// `hexEncode`: lower-case hex of each byte.
pub fn hex_encode(input: &str) -> Cow<'_, str> {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(input.len() * 2);
    for b in input.bytes() {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0f)]));
    }
    Cow::Owned(out)
}

/// `length`: byte length as a decimal string.
pub fn length(input: &str) -> Cow<'_, str> {
    Cow::Owned(input.len().to_string())
}

/// `md5`: hex digest.
pub fn md5(input: &str) -> Cow<'_, str> {
    Cow::Owned(format!("{:x}", md5::Md5::digest(input.as_bytes())))
}

/// `sha1`: hex digest.
pub fn sha1(input: &str) -> Cow<'_, str> {
    Cow::Owned(format!("{:x}", sha1::Sha1::digest(input.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(url_encode("safe-name_1.txt~"), "safe-name_1.txt~");
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(base64_encode("hello"), "aGVsbG8=");
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode("AB\n"), "41420a");
    }

    #[test]
    fn test_length_counts_bytes() {
        assert_eq!(length("héllo"), "6");
    }

    #[test]
    fn test_digests() {
        assert_eq!(md5("hello"), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(sha1("hello"), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }
}
