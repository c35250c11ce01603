//! Engine settings populated by configuration directives.

use serde::Serialize;

/// `SecRuleEngine`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RuleEngineMode {
    /// Evaluate rules and honour disruptive actions.
    #[default]
    On,
    /// Do not evaluate rules.
    Off,
    /// Evaluate rules but only log disruptive actions.
    DetectionOnly,
}

impl RuleEngineMode {
    /// `On`, `Off` or `DetectionOnly`, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            "detectiononly" => Some(Self::DetectionOnly),
            _ => None,
        }
    }
}

/// `SecAuditEngine`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AuditEngineMode {
    /// Log every transaction.
    On,
    /// No audit logging.
    #[default]
    Off,
    /// Log interrupted transactions and those matching an `auditlog` rule.
    RelevantOnly,
}

impl AuditEngineMode {
    /// `On`, `Off` or `RelevantOnly`, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            "relevantonly" => Some(Self::RelevantOnly),
            _ => None,
        }
    }
}

/// Parse an `On`/`Off` directive argument.
pub fn parse_on_off(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Default `SecRequestBodyLimit`: 12.5 MiB.
pub const DEFAULT_REQUEST_BODY_LIMIT: usize = 13_107_200;

/// Default `SecResponseBodyLimit`: 512 KiB.
pub const DEFAULT_RESPONSE_BODY_LIMIT: usize = 524_288;

/// Engine configuration shared by every transaction of a [`Waf`](super::Waf).
#[derive(Debug, Clone, Serialize)]
pub struct WafConfig {
    /// `SecRuleEngine`
    pub rule_engine: RuleEngineMode,
    /// `SecRequestBodyAccess`
    pub request_body_access: bool,
    /// `SecResponseBodyAccess`
    pub response_body_access: bool,
    /// `SecRequestBodyLimit`, in bytes.
    pub request_body_limit: usize,
    /// `SecResponseBodyLimit`, in bytes.
    pub response_body_limit: usize,
    /// `SecWebAppId`
    pub web_app_id: String,
    /// `SecComponentSignature` values.
    pub component_signatures: Vec<String>,
    /// `SecAuditEngine`
    pub audit_engine: AuditEngineMode,
    /// Formatter registry name.
    pub audit_log_format: String,
    /// Writer registry name.
    pub audit_log_type: String,
}

impl Default for WafConfig {
    fn default() -> Self {
        Self {
            rule_engine: RuleEngineMode::default(),
            request_body_access: false,
            response_body_access: false,
            request_body_limit: DEFAULT_REQUEST_BODY_LIMIT,
            response_body_limit: DEFAULT_RESPONSE_BODY_LIMIT,
            web_app_id: String::new(),
            component_signatures: Vec::new(),
            audit_engine: AuditEngineMode::default(),
            audit_log_format: "json".to_string(),
            audit_log_type: "noop".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_parse_case_insensitively() {
        assert_eq!(RuleEngineMode::parse("detectiononly"), Some(RuleEngineMode::DetectionOnly));
        assert_eq!(RuleEngineMode::parse("OFF"), Some(RuleEngineMode::Off));
        assert_eq!(RuleEngineMode::parse("maybe"), None);
        assert_eq!(AuditEngineMode::parse("RelevantOnly"), Some(AuditEngineMode::RelevantOnly));
        assert_eq!(parse_on_off("On"), Some(true));
        assert_eq!(parse_on_off("yes"), None);
    }

    #[test]
    fn test_defaults() {
        let config = WafConfig::default();
        assert_eq!(config.rule_engine, RuleEngineMode::On);
        assert_eq!(config.audit_engine, AuditEngineMode::Off);
        assert!(!config.request_body_access);
        assert_eq!(config.audit_log_format, "json");
    }
}
