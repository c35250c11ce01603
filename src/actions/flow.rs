//! Flow actions.

use super::{no_arguments, Action, ActionError, ActionType};
use crate::engine::{RuleMetadata, TransactionState};

/// `chain`: link the next rule statement as this rule's child.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainAction;

impl Action for ChainAction {
    fn init(&mut self, rule: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        no_arguments(data)?;
        rule.has_chain = true;
        Ok(())
    }

    fn evaluate(&self, _: &RuleMetadata, _: &mut dyn TransactionState) {}

    fn action_type(&self) -> ActionType {
        ActionType::Flow
    }
}
