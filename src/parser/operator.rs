//! Operator argument parsing for SecRule.

use crate::error::{Error, Result};

/// Operator used when the rule names none.
pub const DEFAULT_OPERATOR: &str = "rx";

/// The second argument of a `SecRule`, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSpec {
    /// Whether the operator is negated (`!` prefix).
    pub negated: bool,
    /// Operator name without the `@`.
    pub name: String,
    /// Everything after the name.
    pub argument: String,
}

impl OperatorSpec {
    /// Parse `[!]@name [argument]`. Text without `@` is a regex.
    pub fn parse(input: &str) -> Result<Self> {
        let (negated, rest) = match input.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, input),
        };

        let Some(body) = rest.strip_prefix('@') else {
            return Ok(Self {
                negated,
                name: DEFAULT_OPERATOR.to_string(),
                argument: rest.to_string(),
            });
        };

        let (name, argument) = match body.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim_start()),
            None => (body, ""),
        };
        if name.is_empty() {
            return Err(Error::parse("missing operator name after '@'", input));
        }

        Ok(Self {
            negated,
            name: name.to_string(),
            argument: argument.to_string(),
        })
    }
}
