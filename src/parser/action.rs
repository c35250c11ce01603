//! Action list parsing for SecRule and SecAction.
//!
//! Only the syntax is handled here. Names are resolved against the action
//! and transformation registries when the rule is compiled.

use crate::error::{Error, Result};

/// One `name` or `name:value` entry of an action list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    /// Action name as written.
    pub name: String,
    /// Argument with surrounding quotes removed; empty when absent.
    pub value: String,
}

impl ActionSpec {
    /// Whether this entry is a `t:` transformation.
    pub fn is_transformation(&self) -> bool {
        self.name.eq_ignore_ascii_case("t")
    }
}

/// Parse an action list such as `id:1,msg:'a, b',deny`.
///
/// Commas inside quotes do not split. An empty list is valid.
pub fn parse_actions(input: &str) -> Result<Vec<ActionSpec>> {
    let mut actions = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '\'';

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes && chars.peek() == Some(&quote_char) => {
                current.push(c);
                if let Some(quote) = chars.next() {
                    current.push(quote);
                }
            }
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = c;
                current.push(c);
            }
            c if in_quotes && c == quote_char => {
                in_quotes = false;
                current.push(c);
            }
            ',' if !in_quotes => {
                if !current.trim().is_empty() {
                    actions.push(parse_single_action(current.trim(), input)?);
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(Error::parse(
            format!("unterminated {} quote in action list", quote_char),
            input,
        ));
    }
    if !current.trim().is_empty() {
        actions.push(parse_single_action(current.trim(), input)?);
    }

    Ok(actions)
}

fn parse_single_action(input: &str, list: &str) -> Result<ActionSpec> {
    let (name, value) = match input.split_once(':') {
        Some((name, value)) => (name.trim(), unquote(value.trim())),
        None => (input, String::new()),
    };
    if name.is_empty() {
        return Err(Error::parse(format!("action '{}' has no name", input), list));
    }
    Ok(ActionSpec {
        name: name.to_string(),
        value,
    })
}

/// Strip one pair of surrounding quotes and unescape the quote inside.
fn unquote(value: &str) -> String {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            let inner = &value[1..value.len() - 1];
            return inner.replace(&format!("\\{}", quote), &quote.to_string());
        }
    }
    value.to_string()
}
