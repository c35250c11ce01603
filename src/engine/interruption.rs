//! Interruptions raised by disruptive actions.

use serde::Serialize;

use super::phase::Phase;

/// Decision to stop processing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interruption {
    /// Rule that raised it (the chain head for chained rules).
    pub rule_id: u64,
    /// Action name, e.g. `deny` or `redirect`.
    pub action: String,
    /// HTTP status to return.
    pub status: u16,
    /// Action data such as a redirect URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Phase the interruption happened in. Filled in by the transaction.
    pub phase: Option<Phase>,
}

impl Interruption {
    /// Create an interruption without data.
    pub fn new(rule_id: u64, action: impl Into<String>, status: u16) -> Self {
        Self {
            rule_id,
            action: action.into(),
            status,
            data: None,
            phase: None,
        }
    }

    /// Attach action data.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// One-line summary for logs.
    pub fn format_log(&self) -> String {
        let mut line = format!(
            "[action {}] [status {}] [id {}]",
            self.action, self.status, self.rule_id
        );
        if let Some(ref data) = self.data {
            line.push_str(&format!(" [data {}]", data));
        }
        if let Some(phase) = self.phase {
            line.push_str(&format!(" [phase {}]", phase.name()));
        }
        line
    }
}
