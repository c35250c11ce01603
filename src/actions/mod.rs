//! Rule actions.
//!
//! An action is created by the registry, initialised once with its argument
//! while the rule compiles, and evaluated every time the rule (or its whole
//! chain) matches.

mod data;
mod disruptive;
mod flow;
mod metadata;

pub use data::{CaptureAction, SetVarAction, SetVarOperation};
pub use disruptive::{
    AllowAction, BlockAction, DenyAction, DropAction, PassAction, RedirectAction,
};
pub use flow::ChainAction;
pub use metadata::{
    AccuracyAction, AuditLogAction, IdAction, LogAction, LogDataAction, MaturityAction,
    MsgAction, NoAuditLogAction, NoLogAction, PhaseAction, RevAction, SeverityAction,
    StatusAction, TagAction, VerAction,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::engine::{RuleMetadata, TransactionState};
use crate::error::{Error, Result};

/// When and how an action takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Only changes rule metadata at compile time.
    Metadata,
    /// May stop the transaction.
    Disruptive,
    /// Like metadata but carries data used at evaluation time.
    Data,
    /// Runs on match without interrupting.
    Nondisruptive,
    /// Changes how rules are linked.
    Flow,
}

/// Argument validation failure reported by [`Action::init`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// An argument was given to an action that takes none.
    #[error("unexpected arguments")]
    UnexpectedArguments,
    /// A required argument is absent.
    #[error("missing arguments")]
    MissingArguments,
    /// The argument could not be parsed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// A rule action.
pub trait Action: Send + Sync {
    /// Validate `data` and apply compile-time effects to the rule.
    fn init(&mut self, rule: &mut RuleMetadata, data: &str) -> std::result::Result<(), ActionError>;

    /// Run the action for a matched rule.
    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState);

    /// Category used for ordering and for `DetectionOnly` handling.
    fn action_type(&self) -> ActionType;
}

pub(crate) fn no_arguments(data: &str) -> std::result::Result<(), ActionError> {
    if data.is_empty() {
        Ok(())
    } else {
        Err(ActionError::UnexpectedArguments)
    }
}

pub(crate) fn required_argument(data: &str) -> std::result::Result<&str, ActionError> {
    if data.is_empty() {
        Err(ActionError::MissingArguments)
    } else {
        Ok(data)
    }
}

/// Creates a fresh, uninitialised action.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// Name to action factory table. Names are case-insensitive.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ActionRegistry").field("names", &names).finish()
    }
}

impl ActionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in action.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("id", || Box::new(IdAction));
        registry.register("phase", || Box::new(PhaseAction));
        registry.register("msg", || Box::new(MsgAction));
        registry.register("logdata", || Box::new(LogDataAction));
        registry.register("severity", || Box::new(SeverityAction));
        registry.register("tag", || Box::new(TagAction));
        registry.register("rev", || Box::new(RevAction));
        registry.register("ver", || Box::new(VerAction));
        registry.register("maturity", || Box::new(MaturityAction));
        registry.register("accuracy", || Box::new(AccuracyAction));
        registry.register("status", || Box::new(StatusAction));
        registry.register("log", || Box::new(LogAction));
        registry.register("nolog", || Box::new(NoLogAction));
        registry.register("auditlog", || Box::new(AuditLogAction));
        registry.register("noauditlog", || Box::new(NoAuditLogAction));
        registry.register("chain", || Box::new(ChainAction));
        registry.register("capture", || Box::new(CaptureAction));
        registry.register("setvar", || Box::new(SetVarAction::default()));
        registry.register("deny", || Box::new(DenyAction));
        registry.register("drop", || Box::new(DropAction));
        registry.register("block", || Box::new(BlockAction));
        registry.register("redirect", || Box::new(RedirectAction::default()));
        registry.register("allow", || Box::new(AllowAction::default()));
        registry.register("pass", || Box::new(PassAction));
        registry
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(name.to_lowercase(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(action = name, "action overridden");
        }
    }

    /// Create a new, uninitialised action named `name`.
    pub fn get(&self, name: &str) -> Result<Box<dyn Action>> {
        self.factories
            .get(&name.to_lowercase())
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownAction {
                name: name.to_string(),
            })
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }
}
