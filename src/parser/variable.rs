//! Variable names and rule target parsing.
//!
//! A target list is `|`-separated. Each entry may be:
//!
//! ```text
//! VAR            every value of VAR
//! VAR:key        values stored under `key` (case-insensitive)
//! VAR:/regex/    values whose key matches `regex` (case-insensitive)
//! &VAR           number of values
//! !VAR:key       drop `key` from earlier VAR targets
//! ```

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// How a variable stores its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// One string value.
    Single,
    /// Ordered multi-map of key to values.
    Keyed,
    /// Names view over a keyed variable: each key is reported as the value.
    Names(VariableName),
}

macro_rules! variables {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)*) => {
        /// Variables that rules and macros can reference.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum VariableName {
            $($(#[$doc])* $variant,)*
        }

        impl VariableName {
            /// Every supported variable.
            pub const ALL: &'static [VariableName] = &[$(VariableName::$variant,)*];

            /// Canonical upper-case name.
            pub fn name(&self) -> &'static str {
                match self {
                    $(VariableName::$variant => $name,)*
                }
            }
        }
    };
}

variables! {
    /// All arguments (GET and POST).
    Args => "ARGS",
    /// GET arguments only.
    ArgsGet => "ARGS_GET",
    /// POST arguments only.
    ArgsPost => "ARGS_POST",
    /// Argument names.
    ArgsNames => "ARGS_NAMES",
    /// GET argument names.
    ArgsGetNames => "ARGS_GET_NAMES",
    /// POST argument names.
    ArgsPostNames => "ARGS_POST_NAMES",
    /// Request URI including the query string.
    RequestUri => "REQUEST_URI",
    /// Request URI as received.
    RequestUriRaw => "REQUEST_URI_RAW",
    /// Path portion of the URI.
    RequestFilename => "REQUEST_FILENAME",
    /// Last path segment.
    RequestBasename => "REQUEST_BASENAME",
    /// `METHOD URI PROTOCOL`.
    RequestLine => "REQUEST_LINE",
    /// HTTP method.
    RequestMethod => "REQUEST_METHOD",
    /// HTTP protocol.
    RequestProtocol => "REQUEST_PROTOCOL",
    /// Request headers.
    RequestHeaders => "REQUEST_HEADERS",
    /// Request header names.
    RequestHeadersNames => "REQUEST_HEADERS_NAMES",
    /// Request cookies.
    RequestCookies => "REQUEST_COOKIES",
    /// Request cookie names.
    RequestCookiesNames => "REQUEST_COOKIES_NAMES",
    /// Request body.
    RequestBody => "REQUEST_BODY",
    /// Request body length.
    RequestBodyLength => "REQUEST_BODY_LENGTH",
    /// Query string.
    QueryString => "QUERY_STRING",
    /// Response status code.
    ResponseStatus => "RESPONSE_STATUS",
    /// Response protocol.
    ResponseProtocol => "RESPONSE_PROTOCOL",
    /// Response headers.
    ResponseHeaders => "RESPONSE_HEADERS",
    /// Response header names.
    ResponseHeadersNames => "RESPONSE_HEADERS_NAMES",
    /// Response body.
    ResponseBody => "RESPONSE_BODY",
    /// Response content type.
    ResponseContentType => "RESPONSE_CONTENT_TYPE",
    /// Remote (client) IP address.
    RemoteAddr => "REMOTE_ADDR",
    /// Remote port.
    RemotePort => "REMOTE_PORT",
    /// Server IP address.
    ServerAddr => "SERVER_ADDR",
    /// Server port.
    ServerPort => "SERVER_PORT",
    /// Server name.
    ServerName => "SERVER_NAME",
    /// Transaction id.
    UniqueId => "UNIQUE_ID",
    /// Transaction collection.
    Tx => "TX",
    /// Environment collection.
    Env => "ENV",
    /// Metadata of the rule being executed.
    Rule => "RULE",
    /// Last matched value.
    MatchedVar => "MATCHED_VAR",
    /// Full name of the last matched variable.
    MatchedVarName => "MATCHED_VAR_NAME",
    /// Values matched by the current rule.
    MatchedVars => "MATCHED_VARS",
    /// Names of the variables matched by the current rule.
    MatchedVarsNames => "MATCHED_VARS_NAMES",
}

impl VariableName {
    /// Look a variable up by name, case-insensitively.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(s))
    }

    /// Storage kind of this variable.
    pub fn kind(&self) -> VariableKind {
        use VariableName::*;
        match self {
            Args | ArgsGet | ArgsPost | RequestHeaders | RequestCookies | ResponseHeaders | Tx
            | Env | Rule | MatchedVars => VariableKind::Keyed,
            ArgsNames => VariableKind::Names(Args),
            ArgsGetNames => VariableKind::Names(ArgsGet),
            ArgsPostNames => VariableKind::Names(ArgsPost),
            RequestHeadersNames => VariableKind::Names(RequestHeaders),
            RequestCookiesNames => VariableKind::Names(RequestCookies),
            ResponseHeadersNames => VariableKind::Names(ResponseHeaders),
            MatchedVarsNames => VariableKind::Names(MatchedVars),
            _ => VariableKind::Single,
        }
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for VariableName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Key selector on a collection target.
#[derive(Debug, Clone)]
pub enum TargetKey {
    /// Exact key, stored lower-cased.
    Literal(String),
    /// Keys matching a case-insensitive regex.
    Regex(Arc<Regex>),
}

/// One target of a rule.
#[derive(Debug, Clone)]
pub struct RuleTarget {
    /// The variable.
    pub variable: VariableName,
    /// Optional key selection.
    pub key: Option<TargetKey>,
    /// Count mode (`&` prefix).
    pub count: bool,
    /// Lower-cased keys excluded through `!VAR:key`.
    pub exceptions: Vec<String>,
}

impl RuleTarget {
    /// Target covering every value of `variable`.
    pub fn new(variable: VariableName) -> Self {
        Self {
            variable,
            key: None,
            count: false,
            exceptions: Vec::new(),
        }
    }
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count {
            f.write_str("&")?;
        }
        f.write_str(self.variable.name())?;
        match &self.key {
            Some(TargetKey::Literal(key)) => write!(f, ":{}", key),
            Some(TargetKey::Regex(re)) => write!(f, ":/{}/", re.as_str().trim_start_matches("(?i)")),
            None => Ok(()),
        }
    }
}

/// Parse a target list such as `ARGS|REQUEST_HEADERS:User-Agent|!ARGS:pwd`.
pub fn parse_targets(input: &str) -> Result<Vec<RuleTarget>> {
    let mut targets: Vec<RuleTarget> = Vec::new();

    for part in split_targets(input) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some(excluded) = part.strip_prefix('!') {
            let (name, key) = split_name_key(excluded);
            let variable = lookup(name)?;
            let key = key
                .map(unquote)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| Error::parse(format!("exclusion '{}' needs a key", part), input))?;
            let key = key.to_lowercase();
            let mut applied = false;
            for target in targets.iter_mut().filter(|t| t.variable == variable) {
                target.exceptions.push(key.clone());
                applied = true;
            }
            if !applied {
                tracing::debug!(target = part, "exclusion has no matching target");
            }
            continue;
        }

        targets.push(parse_single_target(part)?);
    }

    if targets.is_empty() {
        return Err(Error::parse("empty variable list", input));
    }
    Ok(targets)
}

fn parse_single_target(input: &str) -> Result<RuleTarget> {
    let (count, input) = match input.strip_prefix('&') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (name, key) = split_name_key(input);
    let mut target = RuleTarget::new(lookup(name)?);
    target.count = count;

    if let Some(raw) = key {
        let raw = unquote(raw);
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let pattern = &raw[1..raw.len() - 1];
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::RegexCompile {
                    pattern: pattern.to_string(),
                    source: e,
                })?;
            target.key = Some(TargetKey::Regex(Arc::new(re)));
        } else if !raw.is_empty() {
            target.key = Some(TargetKey::Literal(raw.to_lowercase()));
        }
    }

    Ok(target)
}

fn lookup(name: &str) -> Result<VariableName> {
    VariableName::from_name(name.trim()).ok_or_else(|| Error::UnknownVariable {
        name: name.trim().to_string(),
    })
}

fn split_name_key(input: &str) -> (&str, Option<&str>) {
    match input.split_once(':') {
        Some((name, key)) => (name, Some(key)),
        None => (input, None),
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Split on `|` outside of `/regex/` keys.
fn split_targets(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_regex = false;
    let mut escaped = false;
    let mut prev = '\0';

    for (i, c) in input.char_indices() {
        if in_regex {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '/' {
                in_regex = false;
            }
        } else if c == '/' && prev == ':' {
            in_regex = true;
        } else if c == '|' {
            parts.push(&input[start..i]);
            start = i + 1;
        }
        prev = c;
    }
    parts.push(&input[start..]);
    parts
}
