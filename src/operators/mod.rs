//! Rule operators and their registry.

mod comparison;
mod network;
mod pattern;
mod rx;
mod traits;
mod validation;

pub use comparison::{NumericComparison, NumericOperator, StringComparison, StringOperator};
pub use network::IpMatchOperator;
pub use pattern::PmOperator;
pub use rx::RxOperator;
pub use traits::{Operator, OperatorOptions};
pub use validation::{
    ValidateByteRangeOperator, ValidateUrlEncodingOperator, ValidateUtf8EncodingOperator,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::TransactionState;
use crate::error::{Error, Result};

/// Builds an operator from its options.
pub type OperatorFactory =
    Arc<dyn Fn(&OperatorOptions) -> Result<Box<dyn Operator>> + Send + Sync>;

/// Name to factory table. Names are case-insensitive.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    factories: HashMap<String, OperatorFactory>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("OperatorRegistry").field("names", &names).finish()
    }
}

impl OperatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("rx", RxOperator::from_options);
        registry.register("pm", PmOperator::from_options);
        registry.register("pmFromFile", PmOperator::from_file);
        registry.register("pmf", PmOperator::from_file);
        for (name, kind) in [
            ("contains", StringComparison::Contains),
            ("streq", StringComparison::Equals),
            ("beginsWith", StringComparison::BeginsWith),
            ("endsWith", StringComparison::EndsWith),
            ("within", StringComparison::Within),
        ] {
            registry.register(name, StringOperator::factory(kind));
        }
        for (name, kind) in [
            ("eq", NumericComparison::Eq),
            ("ne", NumericComparison::Ne),
            ("gt", NumericComparison::Gt),
            ("ge", NumericComparison::Ge),
            ("lt", NumericComparison::Lt),
            ("le", NumericComparison::Le),
        ] {
            registry.register(name, NumericOperator::factory(kind));
        }
        registry.register("ipMatch", IpMatchOperator::from_options);
        registry.register("ipMatchFromFile", IpMatchOperator::from_file);
        registry.register("ipMatchF", IpMatchOperator::from_file);
        registry.register("validateUrlEncoding", |_: &OperatorOptions| {
            Ok(Box::new(ValidateUrlEncodingOperator) as Box<dyn Operator>)
        });
        registry.register("validateUtf8Encoding", |_: &OperatorOptions| {
            Ok(Box::new(ValidateUtf8EncodingOperator) as Box<dyn Operator>)
        });
        registry.register("validateByteRange", ValidateByteRangeOperator::from_options);
        registry.register("unconditionalMatch", |_: &OperatorOptions| {
            Ok(Box::new(UnconditionalMatchOperator) as Box<dyn Operator>)
        });
        registry.register("noMatch", |_: &OperatorOptions| {
            Ok(Box::new(NoMatchOperator) as Box<dyn Operator>)
        });
        registry
    }

    /// Install `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&OperatorOptions) -> Result<Box<dyn Operator>> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(name.to_lowercase(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(operator = name, "operator overridden");
        }
    }

    /// Build the operator registered as `name`.
    pub fn get(&self, name: &str, options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::UnknownOperator {
                name: name.to_string(),
            })?;
        factory(options)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }
}

/// Operator that never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMatchOperator;

impl Operator for NoMatchOperator {
    fn evaluate(&self, _tx: &mut dyn TransactionState, _value: &str) -> bool {
        false
    }

    fn evaluate_bytes(&self, _tx: &mut dyn TransactionState, _value: &[u8]) -> bool {
        false
    }
}

/// Operator that always matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconditionalMatchOperator;

impl Operator for UnconditionalMatchOperator {
    fn evaluate(&self, _tx: &mut dyn TransactionState, _value: &str) -> bool {
        true
    }

    fn evaluate_bytes(&self, _tx: &mut dyn TransactionState, _value: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;

    #[test]
    fn test_builtins_lookup_is_case_insensitive() {
        let registry = OperatorRegistry::with_builtins();
        assert!(registry.contains("RX"));
        assert!(registry.contains("beginswith"));
        let op = registry.get("BeginsWith", &OperatorOptions::new("/admin")).unwrap();
        assert!(op.evaluate(&mut TestState::default(), "/admin/panel"));
    }

    #[test]
    fn test_unknown_operator() {
        let registry = OperatorRegistry::with_builtins();
        let err = registry.get("detectMagic", &OperatorOptions::new("")).err().unwrap();
        assert!(matches!(err, Error::UnknownOperator { name } if name == "detectMagic"));
    }

    #[test]
    fn test_register_overrides() {
        let mut registry = OperatorRegistry::with_builtins();
        registry.register("rx", |_: &OperatorOptions| {
            Ok(Box::new(NoMatchOperator) as Box<dyn Operator>)
        });
        let op = registry.get("rx", &OperatorOptions::new(".*")).unwrap();
        assert!(!op.evaluate(&mut TestState::default(), "anything"));
    }

    #[test]
    fn test_factory_errors_propagate() {
        let registry = OperatorRegistry::with_builtins();
        assert!(registry.get("rx", &OperatorOptions::new("(")).is_err());
        assert!(registry.get("ipMatch", &OperatorOptions::new("nope")).is_err());
    }
}
