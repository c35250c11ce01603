//! The set of plugin tables a parser and engine work with.

use crate::actions::ActionRegistry;
use crate::auditlog::{AuditLogFormatterRegistry, AuditLogWriterRegistry};
use crate::bodyprocessors::BodyProcessorRegistry;
use crate::operators::OperatorRegistry;
use crate::transformations::TransformationRegistry;

/// Operators, transformations, actions, body processors and audit log
/// plugins available to one engine.
///
/// Populate it before compiling rules; a compiled [`Waf`](crate::Waf) only
/// reads it.
#[derive(Debug, Clone)]
pub struct Registry {
    /// `@name` operators.
    pub operators: OperatorRegistry,
    /// `t:name` transformations.
    pub transformations: TransformationRegistry,
    /// Rule actions.
    pub actions: ActionRegistry,
    /// Request body parsers and their content types.
    pub body_processors: BodyProcessorRegistry,
    /// `SecAuditLogFormat` values.
    pub audit_formatters: AuditLogFormatterRegistry,
    /// `SecAuditLogType` values.
    pub audit_writers: AuditLogWriterRegistry,
}

impl Registry {
    /// Registry holding every built-in.
    pub fn new() -> Self {
        Self {
            operators: OperatorRegistry::with_builtins(),
            transformations: TransformationRegistry::with_builtins(),
            actions: ActionRegistry::with_builtins(),
            body_processors: BodyProcessorRegistry::with_builtins(),
            audit_formatters: AuditLogFormatterRegistry::with_builtins(),
            audit_writers: AuditLogWriterRegistry::with_builtins(),
        }
    }

    /// Registry with no entries at all.
    pub fn empty() -> Self {
        Self {
            operators: OperatorRegistry::new(),
            transformations: TransformationRegistry::new(),
            actions: ActionRegistry::new(),
            body_processors: BodyProcessorRegistry::new(),
            audit_formatters: AuditLogFormatterRegistry::new(),
            audit_writers: AuditLogWriterRegistry::new(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let registry = Registry::new();
        assert!(registry.operators.contains("rx"));
        assert!(registry.actions.contains("deny"));
        assert!(registry.transformations.get("lowercase").is_ok());
        assert!(registry.body_processors.get("urlencoded").is_ok());
        assert!(registry.audit_formatters.get("json").is_ok());
        assert!(registry.audit_writers.get("noop").is_ok());
    }

    #[test]
    fn test_registries_are_independent() {
        let mut custom = Registry::new();
        custom.transformations.register("lowercase", |s: &str| std::borrow::Cow::Borrowed(s));
        let stock = Registry::new();
        assert_eq!(custom.transformations.get("lowercase").unwrap().transform("A"), "A");
        assert_eq!(stock.transformations.get("lowercase").unwrap().transform("A"), "a");
        assert!(!Registry::empty().operators.contains("rx"));
    }
}
