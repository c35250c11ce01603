//! Rule model and transaction engine.

mod config;
mod interruption;
mod phase;
mod rule;
mod ruleset;
mod state;
mod transaction;

pub use config::{
    parse_on_off, AuditEngineMode, RuleEngineMode, WafConfig, DEFAULT_REQUEST_BODY_LIMIT,
    DEFAULT_RESPONSE_BODY_LIMIT,
};
pub use interruption::Interruption;
pub use phase::Phase;
pub use rule::{Rule, RuleAction, RuleMetadata, RuleOperator, Severity};
pub use ruleset::RuleSet;
pub use state::{AllowScope, TransactionState};
pub use transaction::{MatchedRule, Transaction};

#[cfg(test)]
pub(crate) use state::testing;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::parser::Parser;
use crate::registry::Registry;

/// A compiled engine. Cheap to clone; every clone shares the same rules.
///
/// Rules and configuration are immutable once built, so transactions can
/// be created from any number of threads.
#[derive(Clone)]
pub struct Waf {
    registry: Arc<Registry>,
    rules: Arc<RuleSet>,
    config: Arc<WafConfig>,
}

impl Waf {
    /// Assemble an engine from already compiled parts.
    pub fn new(registry: Arc<Registry>, rules: RuleSet, config: WafConfig) -> Self {
        Self {
            registry,
            rules: Arc::new(rules),
            config: Arc::new(config),
        }
    }

    /// Compile rules from a string with the built-in registry.
    pub fn from_string(rules: &str) -> Result<Self> {
        let mut parser = Parser::new();
        parser.parse_str(rules)?;
        parser.build()
    }

    /// Compile rules from a file with the built-in registry.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut parser = Parser::new();
        parser.parse_file(path.as_ref())?;
        parser.build()
    }

    /// Start a transaction with a random id.
    pub fn new_transaction(&self) -> Transaction {
        self.new_transaction_with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Start a transaction with a caller-chosen id.
    pub fn new_transaction_with_id(&self, id: impl Into<String>) -> Transaction {
        Transaction::new(self.clone(), id.into())
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &WafConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of top-level rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl std::fmt::Debug for Waf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waf")
            .field("rule_count", &self.rules.len())
            .field("rule_engine", &self.config.rule_engine)
            .finish()
    }
}
