//! Transformations applied to values before operator evaluation.
//!
//! A transformation is any total `&str -> Cow<str>` function. Plain functions
//! and closures register directly. Values that are not UTF-8 go through
//! [`Transformation::transform_bytes`]; the decoders and case rewrites keep
//! such bytes intact.

mod decode;
mod encode;
mod normalize;
mod pipeline;

pub use decode::{
    base64_decode, base64_decode_bytes, base64_decode_ext, base64_decode_ext_bytes, css_decode,
    hex_decode, hex_decode_bytes, html_entity_decode, js_decode, url_decode, url_decode_bytes,
    url_decode_uni, url_decode_uni_bytes,
};
pub use encode::{base64_encode, hex_encode, length, md5, sha1, url_encode};
pub use normalize::{
    cmd_line, compress_whitespace, lowercase, lowercase_bytes, normalize_path,
    normalize_path_win, remove_comments, remove_nulls, remove_nulls_bytes, remove_whitespace,
    replace_nulls, trim, trim_left, trim_right, uppercase, uppercase_bytes,
};
pub use pipeline::TransformationPipeline;

pub(crate) use decode::hex_value;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A pure, total string rewrite.
pub trait Transformation: Send + Sync {
    /// Apply to `input`.
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str>;

    /// Apply to raw bytes. The default runs [`transform`](Self::transform)
    /// on the text, decoded lossily when the bytes are not UTF-8.
    fn transform_bytes<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        match std::str::from_utf8(input) {
            Ok(text) => match self.transform(text) {
                Cow::Borrowed(out) => Cow::Borrowed(out.as_bytes()),
                Cow::Owned(out) => Cow::Owned(out.into_bytes()),
            },
            Err(_) => {
                let text = String::from_utf8_lossy(input);
                Cow::Owned(self.transform(&text).into_owned().into_bytes())
            }
        }
    }
}

impl<F> Transformation for F
where
    F: for<'a> Fn(&'a str) -> Cow<'a, str> + Send + Sync,
{
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self(input)
    }
}

type TextFn = for<'a> fn(&'a str) -> Cow<'a, str>;
type BytesFn = for<'a> fn(&'a [u8]) -> Cow<'a, [u8]>;

/// A transformation with separate text and byte implementations.
#[derive(Clone, Copy)]
pub struct BinarySafe {
    text: TextFn,
    bytes: BytesFn,
}

impl BinarySafe {
    /// Pair a text function with its byte counterpart.
    pub fn new(text: TextFn, bytes: BytesFn) -> Self {
        Self { text, bytes }
    }
}

impl Transformation for BinarySafe {
    fn transform<'a>(&self, input: &'a str) -> Cow<'a, str> {
        (self.text)(input)
    }

    fn transform_bytes<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        (self.bytes)(input)
    }
}

/// Name to transformation table. Names are case-insensitive.
#[derive(Clone, Default)]
pub struct TransformationRegistry {
    transformations: HashMap<String, Arc<dyn Transformation>>,
}

impl fmt::Debug for TransformationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.transformations.keys().collect();
        names.sort();
        f.debug_struct("TransformationRegistry")
            .field("names", &names)
            .finish()
    }
}

impl TransformationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in transformation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_binary_safe("lowercase", lowercase, lowercase_bytes);
        registry.register_binary_safe("uppercase", uppercase, uppercase_bytes);
        registry.register_binary_safe("urlDecode", url_decode, url_decode_bytes);
        registry.register_binary_safe("urlDecodeUni", url_decode_uni, url_decode_uni_bytes);
        registry.register("urlEncode", url_encode);
        registry.register_binary_safe("base64Decode", base64_decode, base64_decode_bytes);
        registry.register_binary_safe(
            "base64DecodeExt",
            base64_decode_ext,
            base64_decode_ext_bytes,
        );
        registry.register("base64Encode", base64_encode);
        registry.register_binary_safe("hexDecode", hex_decode, hex_decode_bytes);
        registry.register("hexEncode", hex_encode);
        registry.register("htmlEntityDecode", html_entity_decode);
        registry.register("jsDecode", js_decode);
        registry.register("cssDecode", css_decode);
        registry.register("compressWhitespace", compress_whitespace);
        registry.register("removeWhitespace", remove_whitespace);
        registry.register_binary_safe("removeNulls", remove_nulls, remove_nulls_bytes);
        registry.register("replaceNulls", replace_nulls);
        registry.register("trim", trim);
        registry.register("trimLeft", trim_left);
        registry.register("trimRight", trim_right);
        registry.register("normalizePath", normalize_path);
        registry.register("normalisePath", normalize_path);
        registry.register("normalizePathWin", normalize_path_win);
        registry.register("normalisePathWin", normalize_path_win);
        registry.register("removeComments", remove_comments);
        registry.register("cmdLine", cmd_line);
        registry.register("length", length);
        registry.register("md5", md5);
        registry.register("sha1", sha1);
        registry
    }

    /// Register a function or closure under `name`, replacing any previous
    /// entry.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: for<'a> Fn(&'a str) -> Cow<'a, str> + Send + Sync + 'static,
    {
        self.register_transformation(name, Arc::new(f));
    }

    fn register_binary_safe(&mut self, name: &str, text: TextFn, bytes: BytesFn) {
        self.register_transformation(name, Arc::new(BinarySafe::new(text, bytes)));
    }

    /// Register a [`Transformation`] object under `name`.
    pub fn register_transformation(&mut self, name: &str, t: Arc<dyn Transformation>) {
        if self.transformations.insert(name.to_lowercase(), t).is_some() {
            tracing::debug!(transformation = name, "transformation overridden");
        }
    }

    /// Look up `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Transformation>> {
        self.transformations
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownTransformation {
                name: name.to_string(),
            })
    }
}
