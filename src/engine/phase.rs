//! Transaction phases.

use serde::Serialize;
use std::fmt;

/// The five evaluation points of a transaction, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[repr(u8)]
pub enum Phase {
    /// Phase 1: request headers.
    RequestHeaders = 1,
    /// Phase 2: request body.
    #[default]
    RequestBody = 2,
    /// Phase 3: response headers.
    ResponseHeaders = 3,
    /// Phase 4: response body.
    ResponseBody = 4,
    /// Phase 5: logging. Runs even after an interruption.
    Logging = 5,
}

impl Phase {
    /// Every phase in evaluation order.
    pub const ALL: [Phase; 5] = [
        Phase::RequestHeaders,
        Phase::RequestBody,
        Phase::ResponseHeaders,
        Phase::ResponseBody,
        Phase::Logging,
    ];

    /// Phase number (1-5).
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Upper-case phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::RequestHeaders => "REQUEST_HEADERS",
            Phase::RequestBody => "REQUEST_BODY",
            Phase::ResponseHeaders => "RESPONSE_HEADERS",
            Phase::ResponseBody => "RESPONSE_BODY",
            Phase::Logging => "LOGGING",
        }
    }

    /// Phase for a number.
    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    /// Parse a `phase:` argument: a number or `request`, `response`, `logging`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Some(Phase::RequestBody),
            "response" => Some(Phase::ResponseBody),
            "logging" => Some(Phase::Logging),
            other => other.parse().ok().and_then(Self::from_number),
        }
    }

    /// Whether this phase inspects the request.
    pub fn is_request_phase(&self) -> bool {
        matches!(self, Phase::RequestHeaders | Phase::RequestBody)
    }

    /// Whether this phase inspects the response.
    pub fn is_response_phase(&self) -> bool {
        matches!(self, Phase::ResponseHeaders | Phase::ResponseBody)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_number() {
        assert_eq!(Phase::from_number(1), Some(Phase::RequestHeaders));
        assert_eq!(Phase::from_number(5), Some(Phase::Logging));
        assert_eq!(Phase::from_number(0), None);
        assert_eq!(Phase::from_number(6), None);
    }

    #[test]
    fn test_phase_parse_names() {
        assert_eq!(Phase::parse("request"), Some(Phase::RequestBody));
        assert_eq!(Phase::parse("RESPONSE"), Some(Phase::ResponseBody));
        assert_eq!(Phase::parse("logging"), Some(Phase::Logging));
        assert_eq!(Phase::parse("3"), Some(Phase::ResponseHeaders));
        assert_eq!(Phase::parse("nine"), None);
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::RequestHeaders < Phase::Logging);
        assert_eq!(Phase::default(), Phase::RequestBody);
    }
}
