//! Audit log summary and the formatter/writer plugin points.
//!
//! The engine only builds an [`AuditLog`]; a formatter turns it into bytes
//! and a writer decides where those bytes go.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::{Interruption, MatchedRule, RuleEngineMode};
use crate::error::{Error, Result};

/// Read-only summary of one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    /// `UNIQUE_ID` of the transaction.
    pub transaction_id: String,
    /// Transaction start, serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// `REMOTE_ADDR`
    pub client_ip: String,
    /// `REMOTE_PORT`
    pub client_port: u16,
    /// `SERVER_ADDR`
    pub server_ip: String,
    /// `SERVER_PORT`
    pub server_port: u16,
    /// Request line and headers.
    pub request: AuditRequest,
    /// Response status line and headers.
    pub response: AuditResponse,
    /// Engine and rule set identification.
    pub producer: AuditProducer,
    /// Matched rules that asked for audit logging.
    pub messages: Vec<MatchedRule>,
    /// The enforced interruption, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interruption: Option<Interruption>,
}

/// Request part of an [`AuditLog`].
#[derive(Debug, Clone, Serialize)]
pub struct AuditRequest {
    /// `REQUEST_METHOD`
    pub method: String,
    /// `REQUEST_URI`, as received.
    pub uri: String,
    /// `REQUEST_PROTOCOL`
    pub protocol: String,
    /// Headers in arrival order.
    pub headers: Vec<(String, String)>,
}

/// Response part of an [`AuditLog`]. Empty until response headers are
/// processed.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResponse {
    /// Status code, 0 when no response was seen.
    pub status: u16,
    /// `RESPONSE_PROTOCOL`
    pub protocol: String,
    /// Headers in arrival order.
    pub headers: Vec<(String, String)>,
}

/// Who produced the log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditProducer {
    /// Engine name and version.
    pub engine: String,
    /// `SecComponentSignature` values.
    pub components: Vec<String>,
    /// `SecWebAppId`
    pub web_app_id: String,
    /// `SecRuleEngine` mode in effect.
    pub rule_engine: RuleEngineMode,
}

/// Renders an audit log to bytes.
pub trait AuditLogFormatter: Send + Sync {
    /// Serialize `log`.
    fn format(&self, log: &AuditLog) -> Result<Vec<u8>>;
}

/// Persists an audit log.
pub trait AuditLogWriter: Send + Sync {
    /// Format `log` with `formatter` and store the result.
    fn write(&self, log: &AuditLog, formatter: &dyn AuditLogFormatter) -> Result<()>;
}

/// One JSON document per transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl AuditLogFormatter for JsonFormatter {
    fn format(&self, log: &AuditLog) -> Result<Vec<u8>> {
        serde_json::to_vec(log).map_err(|e| Error::AuditLog {
            message: e.to_string(),
        })
    }
}

/// Discards every log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWriter;

impl AuditLogWriter for NoopWriter {
    fn write(&self, _: &AuditLog, _: &dyn AuditLogFormatter) -> Result<()> {
        Ok(())
    }
}

macro_rules! audit_registry {
    ($(#[$doc:meta])* $name:ident, $plugin:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Clone, Default)]
        pub struct $name {
            entries: HashMap<String, Arc<dyn $plugin>>,
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut names: Vec<&String> = self.entries.keys().collect();
                names.sort();
                f.debug_struct(stringify!($name)).field("names", &names).finish()
            }
        }

        impl $name {
            /// Empty registry.
            pub fn new() -> Self {
                Self::default()
            }

            /// Register `plugin` under `name`, replacing any previous entry.
            pub fn register(&mut self, name: &str, plugin: Arc<dyn $plugin>) {
                if self.entries.insert(name.to_lowercase(), plugin).is_some() {
                    tracing::debug!(name, kind = $kind, "audit plugin overridden");
                }
            }

            /// Look up `name`, ignoring case.
            pub fn get(&self, name: &str) -> Result<Arc<dyn $plugin>> {
                self.entries
                    .get(&name.to_lowercase())
                    .cloned()
                    .ok_or_else(|| Error::AuditLog {
                        message: format!("unknown {} '{}'", $kind, name),
                    })
            }

            /// Whether `name` is registered.
            pub fn contains(&self, name: &str) -> bool {
                self.entries.contains_key(&name.to_lowercase())
            }
        }
    };
}

audit_registry!(
    /// Audit log formatters by name.
    AuditLogFormatterRegistry,
    AuditLogFormatter,
    "audit log formatter"
);

audit_registry!(
    /// Audit log writers by name.
    AuditLogWriterRegistry,
    AuditLogWriter,
    "audit log writer"
);

impl AuditLogFormatterRegistry {
    /// Registry with the `json` formatter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("json", Arc::new(JsonFormatter));
        registry
    }
}

impl AuditLogWriterRegistry {
    /// Registry with the `noop` writer.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("noop", Arc::new(NoopWriter));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample() -> AuditLog {
        AuditLog {
            transaction_id: "abc".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            client_ip: "10.0.0.1".to_string(),
            client_port: 1234,
            server_ip: "10.0.0.2".to_string(),
            server_port: 80,
            request: AuditRequest {
                method: "GET".to_string(),
                uri: "/".to_string(),
                protocol: "HTTP/1.1".to_string(),
                headers: vec![("Host".to_string(), "example.com".to_string())],
            },
            response: AuditResponse {
                status: 403,
                protocol: "HTTP/1.1".to_string(),
                headers: Vec::new(),
            },
            producer: AuditProducer {
                engine: "zentinel-seclang/test".to_string(),
                components: vec!["crs/4".to_string()],
                web_app_id: "shop".to_string(),
                rule_engine: RuleEngineMode::On,
            },
            messages: Vec::new(),
            interruption: Some(Interruption::new(1, "deny", 403)),
        }
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<Vec<u8>>>);

    impl AuditLogWriter for Collecting {
        fn write(&self, log: &AuditLog, formatter: &dyn AuditLogFormatter) -> Result<()> {
            let bytes = formatter.format(log)?;
            self.0.lock().unwrap().push(bytes);
            Ok(())
        }
    }

    #[test]
    fn test_json_formatter() {
        let bytes = JsonFormatter.format(&sample()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["transaction_id"], "abc");
        assert_eq!(json["timestamp"], "2024-01-02T03:04:05Z");
        assert_eq!(json["request"]["headers"][0][1], "example.com");
        assert_eq!(json["interruption"]["status"], 403);
        assert_eq!(json["producer"]["rule_engine"], "On");
    }

    #[test]
    fn test_custom_writer() {
        let writer = Arc::new(Collecting::default());
        let mut writers = AuditLogWriterRegistry::with_builtins();
        writers.register("memory", writer.clone());
        writers
            .get("MEMORY")
            .unwrap()
            .write(&sample(), &JsonFormatter)
            .unwrap();
        assert_eq!(writer.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_plugin() {
        let formatters = AuditLogFormatterRegistry::with_builtins();
        assert!(matches!(formatters.get("native"), Err(Error::AuditLog { .. })));
        assert!(formatters.contains("json"));
    }
}
