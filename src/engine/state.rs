//! The transaction surface seen by operators and actions.

use super::interruption::Interruption;
use crate::variables::{CollectionRef, TransactionVariables, VariableName};

/// How far an `allow` action lets the transaction through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowScope {
    /// Skip every remaining request and response phase.
    All,
    /// Skip the rest of the current phase.
    Phase,
    /// Skip the remaining request phases.
    Request,
}

/// Transaction capabilities used by operators and actions.
pub trait TransactionState {
    /// Transaction id.
    fn id(&self) -> &str;

    /// The transaction's variables.
    fn variables(&self) -> &TransactionVariables;

    /// Mutable access to the transaction's variables.
    fn variables_mut(&mut self) -> &mut TransactionVariables;

    /// Whether the current rule asked for capture groups.
    fn capturing(&self) -> bool;

    /// Store capture group `index` (0-9).
    fn capture_field(&mut self, index: usize, value: &str);

    /// Record an interruption. Only the first one is kept.
    fn interrupt(&mut self, interruption: Interruption);

    /// The interruption, if any.
    fn interruption(&self) -> Option<&Interruption>;

    /// Apply an `allow` action.
    fn allow(&mut self, scope: AllowScope);

    /// Collection backing `variable`.
    fn collection(&self, variable: VariableName) -> Option<CollectionRef<'_>> {
        self.variables().collection(variable)
    }
}
