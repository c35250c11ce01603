//! Macro templates such as `%{tx.anomaly_score}`.
//!
//! A macro is compiled once into literal and variable tokens and expanded per
//! transaction. Compiled macros hold no transaction state and can be shared.

use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};
use crate::variables::{TransactionVariables, VariableName};

#[derive(Debug, Clone, PartialEq, Eq)]
enum MacroToken {
    Text(String),
    Variable {
        /// `%{...}` as written, returned when the key is missing.
        text: String,
        variable: VariableName,
        key: Option<String>,
    },
}

/// A compiled macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    original: String,
    tokens: Vec<MacroToken>,
}

fn is_macro_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '[' | ']')
}

impl Macro {
    /// Compile `input`.
    pub fn new(input: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut text = String::new();
        let mut reference: Option<String> = None;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match reference.as_mut() {
                None if c == '%' && chars.peek() == Some(&'{') => {
                    chars.next();
                    if !text.is_empty() {
                        tokens.push(MacroToken::Text(std::mem::take(&mut text)));
                    }
                    reference = Some(String::new());
                }
                None => text.push(c),
                Some(inner) if c == '}' => {
                    tokens.push(Self::variable_token(inner)?);
                    reference = None;
                }
                Some(inner) if is_macro_char(c) => inner.push(c),
                Some(inner) => {
                    return Err(Error::macro_error(format!(
                        "malformed variable starting with '%{{{}'",
                        inner
                    )));
                }
            }
        }

        if reference.is_some() {
            return Err(Error::macro_error("malformed variable: no closing brace"));
        }
        if !text.is_empty() {
            tokens.push(MacroToken::Text(text));
        }

        Ok(Self {
            original: input.to_string(),
            tokens,
        })
    }

    fn variable_token(inner: &str) -> Result<MacroToken> {
        if inner.ends_with('.') {
            return Err(Error::macro_error(format!("empty key in '%{{{}}}'", inner)));
        }
        let (scope, key) = match inner.split_once('.') {
            Some((scope, key)) => (scope, Some(key.to_lowercase())),
            None => (inner, None),
        };
        let variable = VariableName::from_name(scope).ok_or_else(|| Error::UnknownVariable {
            name: scope.to_string(),
        })?;
        Ok(MacroToken::Variable {
            text: format!("%{{{}}}", inner),
            variable,
            key,
        })
    }

    /// Whether the macro contains any variable reference.
    pub fn is_expandable(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, MacroToken::Variable { .. }))
    }

    /// Expand against a transaction's variables.
    pub fn expand<'a>(&'a self, vars: &TransactionVariables) -> Cow<'a, str> {
        match self.tokens.as_slice() {
            [] => Cow::Borrowed(""),
            [MacroToken::Text(text)] => Cow::Borrowed(text),
            [token] => Cow::Owned(expand_token(token, vars)),
            tokens => Cow::Owned(tokens.iter().map(|t| expand_token(t, vars)).collect()),
        }
    }
}

fn expand_token(token: &MacroToken, vars: &TransactionVariables) -> String {
    let (text, variable, key) = match token {
        MacroToken::Text(text) => return text.clone(),
        MacroToken::Variable {
            text,
            variable,
            key,
        } => (text, *variable, key.as_deref()),
    };

    let resolved = vars.collection(variable).and_then(|collection| {
        match (key, collection.as_keyed()) {
            (Some(key), Some(keyed)) => keyed.get(key).first().map(|v| v.to_string()),
            _ => collection
                .as_collection()
                .find_all()
                .into_iter()
                .next()
                .map(|m| m.value),
        }
    });

    match resolved {
        Some(value) => value,
        None => {
            tracing::warn!(
                variable = variable.name(),
                key = key.unwrap_or(""),
                "key not found in collection, returning the original text"
            );
            text.clone()
        }
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
