//! Decoding transformations.

use base64::Engine;
use std::borrow::Cow;

/// Value of an ASCII hex digit.
pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn hex_pair(bytes: &[u8], at: usize) -> Option<u8> {
    let hi = hex_value(*bytes.get(at)?)?;
    let lo = hex_value(*bytes.get(at + 1)?)?;
    Some(hi << 4 | lo)
}

fn hex_quad(bytes: &[u8], at: usize) -> Option<char> {
    let hi = u32::from(hex_pair(bytes, at)?);
    let lo = u32::from(hex_pair(bytes, at + 2)?);
    char::from_u32(hi << 8 | lo)
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn decoded(out: Vec<u8>) -> Cow<'static, str> {
    match String::from_utf8(out) {
        Ok(s) => Cow::Owned(s),
        Err(e) => Cow::Owned(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

/// Text result of a byte-level decoder. `Borrowed` means nothing changed.
fn as_text<'a>(input: &'a str, out: Cow<'_, [u8]>) -> Cow<'a, str> {
    match out {
        Cow::Borrowed(_) => Cow::Borrowed(input),
        Cow::Owned(out) => decoded(out),
    }
}

fn percent_decode(bytes: &[u8], unicode: bool) -> Cow<'_, [u8]> {
    if !bytes.iter().any(|&b| b == b'%' || b == b'+') {
        return Cow::Borrowed(bytes);
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if unicode && matches!(bytes.get(i + 1), Some(b'u' | b'U')) => {
                match hex_quad(bytes, i + 2) {
                    Some(c) => {
                        push_char(&mut out, c);
                        i += 6;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'%' => match hex_pair(bytes, i + 1) {
                Some(b) => {
                    out.push(b);
                    i += 3;
                }
                None => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Cow::Owned(out)
}

/// `urlDecode`: `%HH` escapes and `+` as space. Invalid escapes are kept.
pub fn url_decode(input: &str) -> Cow<'_, str> {
    as_text(input, url_decode_bytes(input.as_bytes()))
}

/// `urlDecode` over raw bytes; `%FF` decodes to the byte `0xFF`.
pub fn url_decode_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    percent_decode(input, false)
}

/// `urlDecodeUni`: like `urlDecode`, plus `%uHHHH`.
pub fn url_decode_uni(input: &str) -> Cow<'_, str> {
    as_text(input, url_decode_uni_bytes(input.as_bytes()))
}

/// Byte form of [`url_decode_uni`].
pub fn url_decode_uni_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    percent_decode(input, true)
}

/// `base64Decode`: strict decoding; invalid input passes through.
pub fn base64_decode(input: &str) -> Cow<'_, str> {
    as_text(input, base64_decode_bytes(input.as_bytes()))
}

/// [`base64_decode`] without the UTF-8 round trip.
pub fn base64_decode_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    let start = input.iter().position(|b| !b.is_ascii_whitespace());
    let end = input.iter().rposition(|b| !b.is_ascii_whitespace());
    let trimmed = match (start, end) {
        (Some(start), Some(end)) => &input[start..=end],
        _ => &input[..0],
    };
    match base64::engine::general_purpose::STANDARD.decode(trimmed) {
        Ok(bytes) => Cow::Owned(bytes),
        Err(_) => Cow::Borrowed(input),
    }
}

/// `base64DecodeExt`: also accepts the URL-safe alphabet and missing padding.
pub fn base64_decode_ext(input: &str) -> Cow<'_, str> {
    as_text(input, base64_decode_ext_bytes(input.as_bytes()))
}

/// Byte form of [`base64_decode_ext`].
pub fn base64_decode_ext_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
    let trimmed: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(&trimmed).ok())
        .map_or(Cow::Borrowed(input), Cow::Owned)
}

/// `hexDecode`: pairs of hex digits to bytes. Odd or invalid input passes
/// through.
pub fn hex_decode(input: &str) -> Cow<'_, str> {
    as_text(input, hex_decode_bytes(input.as_bytes()))
}

/// Decoded hex pairs as raw bytes.
pub fn hex_decode_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    if input.len() % 2 != 0 {
        return Cow::Borrowed(input);
    }
    let out: Option<Vec<u8>> = (0..input.len())
        .step_by(2)
        .map(|i| hex_pair(input, i))
        .collect();
    out.map_or(Cow::Borrowed(input), Cow::Owned)
}

/// `htmlEntityDecode`: named and numeric entities.
pub fn html_entity_decode(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    html_escape::decode_html_entities(input)
}

/// `jsDecode`: JavaScript string escapes.
pub fn js_decode(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return Cow::Borrowed(input);
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let escaped = match bytes.get(i + 1) {
            Some(b'n') => Some((b'\n', 2)),
            Some(b'r') => Some((b'\r', 2)),
            Some(b't') => Some((b'\t', 2)),
            Some(b'f') => Some((0x0c, 2)),
            Some(b'v') => Some((0x0b, 2)),
            Some(b'0') => Some((0, 2)),
            Some(b'x') => hex_pair(bytes, i + 2).map(|b| (b, 4)),
            _ => None,
        };
        if let Some((b, len)) = escaped {
            push_char(&mut out, char::from(b));
            i += len;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'u') {
            if let Some(c) = hex_quad(bytes, i + 2) {
                push_char(&mut out, c);
                i += 6;
                continue;
            }
        }
        match bytes.get(i + 1) {
            Some(&next) if matches!(next, b'\\' | b'"' | b'\'' | b'/') => {
                out.push(next);
                i += 2;
            }
            _ => {
                out.push(b'\\');
                i += 1;
            }
        }
    }
    decoded(out)
}

/// `cssDecode`: CSS escapes of up to six hex digits, with one optional
/// trailing whitespace character consumed.
pub fn css_decode(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while let Some(&h) = chars.peek() {
            if hex.len() == 6 || !h.is_ascii_hexdigit() {
                break;
            }
            hex.push(h);
            chars.next();
        }
        if hex.is_empty() {
            match chars.next() {
                Some('\n') | None => {}
                Some(other) => out.push(other),
            }
            continue;
        }
        if matches!(chars.peek(), Some(' ' | '\t' | '\n')) {
            chars.next();
        }
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(decoded) => out.push(decoded),
            None => {
                out.push('\\');
                out.push_str(&hex);
            }
        }
    }
    Cow::Owned(out)
}
