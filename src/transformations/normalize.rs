//! Case, whitespace, null-byte and path normalization.

use std::borrow::Cow;

/// `lowercase`
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().any(char::is_uppercase) {
        Cow::Owned(input.to_lowercase())
    } else {
        Cow::Borrowed(input)
    }
}

/// `uppercase`
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().any(char::is_lowercase) {
        Cow::Owned(input.to_uppercase())
    } else {
        Cow::Borrowed(input)
    }
}

/// `compressWhitespace`: runs of whitespace become one space.
pub fn compress_whitespace(input: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    if out == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(out)
    }
}

/// `removeWhitespace`
pub fn remove_whitespace(input: &str) -> Cow<'_, str> {
    if !input.chars().any(char::is_whitespace) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.chars().filter(|c| !c.is_whitespace()).collect())
}

/// `removeNulls`
pub fn remove_nulls(input: &str) -> Cow<'_, str> {
    if input.contains('\0') {
        Cow::Owned(input.replace('\0', ""))
    } else {
        Cow::Borrowed(input)
    }
}

/// Byte form of a text rewrite: UTF-8 input goes through `text`, anything
/// else through `ascii`.
fn via_text<'a>(
    input: &'a [u8],
    text: fn(&str) -> Cow<'_, str>,
    ascii: impl FnOnce(&[u8]) -> Option<Vec<u8>>,
) -> Cow<'a, [u8]> {
    match std::str::from_utf8(input) {
        Ok(s) => match text(s) {
            Cow::Borrowed(_) => Cow::Borrowed(input),
            Cow::Owned(out) => Cow::Owned(out.into_bytes()),
        },
        Err(_) => ascii(input).map_or(Cow::Borrowed(input), Cow::Owned),
    }
}

/// `lowercase` over bytes; only ASCII letters change when the input is not
/// UTF-8.
pub fn lowercase_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    via_text(input, lowercase, |b| {
        b.iter()
            .any(u8::is_ascii_uppercase)
            .then(|| b.to_ascii_lowercase())
    })
}

/// ASCII upper-casing that leaves other bytes alone.
pub fn uppercase_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    via_text(input, uppercase, |b| {
        b.iter()
            .any(u8::is_ascii_lowercase)
            .then(|| b.to_ascii_uppercase())
    })
}

/// Drop every 0x00 byte.
pub fn remove_nulls_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    via_text(input, remove_nulls, |b| {
        b.contains(&0)
            .then(|| b.iter().copied().filter(|&c| c != 0).collect())
    })
}

/// `replaceNulls`: NUL becomes a space.
pub fn replace_nulls(input: &str) -> Cow<'_, str> {
    if input.contains('\0') {
        Cow::Owned(input.replace('\0', " "))
    } else {
        Cow::Borrowed(input)
    }
}

/// `trim`
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// `trimLeft`
pub fn trim_left(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim_start())
}

/// `trimRight`
pub fn trim_right(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim_end())
}

fn collapse_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let trailing = path.len() > 1 && (path.ends_with('/') || path.ends_with("/.") || path.ends_with("/.."));
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.last().map_or(false, |s| *s != "..") {
                    stack.pop();
                } else if !absolute {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }
    let mut out = String::with_capacity(path.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&stack.join("/"));
    if trailing && !stack.is_empty() {
        out.push('/');
    }
    out
}

/// `normalizePath`: remove `.` and `..` segments and repeated slashes.
pub fn normalize_path(input: &str) -> Cow<'_, str> {
    if input.is_empty() {
        return Cow::Borrowed(input);
    }
    let out = collapse_path(input);
    if out == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(out)
    }
}

/// `normalizePathWin`: backslashes become slashes, then `normalizePath`.
pub fn normalize_path_win(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return normalize_path(input);
    }
    Cow::Owned(collapse_path(&input.replace('\\', "/")))
}

/// `removeComments`: drop `/* */`, `<!-- -->`, and `--` or `#` to end of
/// input.
pub fn remove_comments(input: &str) -> Cow<'_, str> {
    if !["/*", "<!--", "--", "#"].iter().any(|m| input.contains(m)) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
        } else if rest.starts_with("--") || rest.starts_with('#') {
            break;
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    Cow::Owned(out)
}

/// `cmdLine`: normalize shell command evasion.
///
/// Deletes `\ " ' ^`, turns `,` and `;` into spaces, collapses whitespace,
/// drops spaces before `/` and `(`, and lower-cases.
pub fn cmd_line(input: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        match c {
            '\\' | '"' | '\'' | '^' => {}
            ',' | ';' => pending_space = true,
            c if c.is_whitespace() => pending_space = true,
            '/' | '(' => {
                pending_space = false;
                out.push(c);
            }
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.extend(c.to_lowercase());
            }
        }
    }
    if out == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_bytes_keep_invalid_utf8() {
        assert_eq!(lowercase_bytes(b"AB\xFF").as_ref(), b"ab\xFF");
        assert_eq!(uppercase_bytes(b"ab\xFF").as_ref(), b"AB\xFF");
        assert_eq!(lowercase_bytes("ÉTÉ".as_bytes()).as_ref(), "été".as_bytes());
        assert!(matches!(lowercase_bytes(b"x\xFF"), Cow::Borrowed(_)));
        assert_eq!(remove_nulls_bytes(b"\xFF\x00a").as_ref(), b"\xFFa");
    }

    #[test]
    fn test_case() {
        assert_eq!(lowercase("Hello World"), "hello world");
        assert!(matches!(lowercase("already lower"), Cow::Borrowed(_)));
        assert_eq!(uppercase("abc"), "ABC");
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(compress_whitespace("hello   world"), "hello world");
        assert_eq!(compress_whitespace("a\t\nb"), "a b");
        assert_eq!(remove_whitespace("a b\tc"), "abc");
        assert_eq!(trim("  x  "), "x");
        assert_eq!(trim_left("  x  "), "x  ");
        assert_eq!(trim_right("  x  "), "  x");
    }

    #[test]
    fn test_nulls() {
        assert_eq!(remove_nulls("a\0b"), "ab");
        assert_eq!(replace_nulls("a\0b"), "a b");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("/a//b/./c"), "/a/b/c");
        assert_eq!(normalize_path("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize_path("a/../../b"), "../b");
        assert_eq!(normalize_path("/dir/"), "/dir/");
        assert_eq!(normalize_path_win("a\\b\\..\\c"), "a/c");
    }

    #[test]
    fn test_remove_comments() {
        assert_eq!(remove_comments("UNION/**/SELECT"), "UNIONSELECT");
        assert_eq!(remove_comments("1 OR 1=1-- -"), "1 OR 1=1");
        assert_eq!(remove_comments("a<!-- x -->b"), "ab");
        assert_eq!(remove_comments("/* open"), "");
    }

    #[test]
    fn test_cmd_line() {
        assert_eq!(cmd_line("CMD;/C"), "cmd/c");
        assert_eq!(cmd_line("echo^hello"), "echohello");
        assert_eq!(cmd_line("c\"a\"t   /etc/passwd"), "cat/etc/passwd");
        assert_eq!(cmd_line("net ,  user"), "net user");
    }
}
