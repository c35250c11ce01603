//! Disruptive actions.

use super::{no_arguments, required_argument, Action, ActionError, ActionType};
use crate::engine::{AllowScope, Interruption, RuleMetadata, TransactionState};

const FORBIDDEN: u16 = 403;
const CONNECTION_CLOSED: u16 = 444;
const FOUND: u16 = 302;

fn status_or(rule: &RuleMetadata, default: u16) -> u16 {
    if rule.status == 0 {
        default
    } else {
        rule.status
    }
}

/// `deny`: stop the transaction with the rule's status, 403 by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAction;

impl Action for DenyAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        no_arguments(data)
    }

    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState) {
        tx.interrupt(Interruption::new(
            rule.effective_id(),
            "deny",
            status_or(rule, FORBIDDEN),
        ));
    }

    fn action_type(&self) -> ActionType {
        ActionType::Disruptive
    }
}

/// `drop`: stop the transaction and close the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropAction;

impl Action for DropAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        no_arguments(data)
    }

    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState) {
        tx.interrupt(Interruption::new(
            rule.effective_id(),
            "drop",
            status_or(rule, CONNECTION_CLOSED),
        ));
    }

    fn action_type(&self) -> ActionType {
        ActionType::Disruptive
    }
}

/// `block`: behaves like `deny`, reported as `block`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockAction;

impl Action for BlockAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        no_arguments(data)
    }

    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState) {
        tx.interrupt(Interruption::new(
            rule.effective_id(),
            "block",
            status_or(rule, FORBIDDEN),
        ));
    }

    fn action_type(&self) -> ActionType {
        ActionType::Disruptive
    }
}

/// `redirect:URL`. Uses the rule's status when it is a redirect code,
/// 302 otherwise.
#[derive(Debug, Clone, Default)]
pub struct RedirectAction {
    target: String,
}

impl Action for RedirectAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        self.target = required_argument(data)?.to_string();
        Ok(())
    }

    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState) {
        let status = match rule.status {
            301 | 302 | 303 | 307 => rule.status,
            _ => FOUND,
        };
        tx.interrupt(
            Interruption::new(rule.effective_id(), "redirect", status).with_data(&self.target),
        );
    }

    fn action_type(&self) -> ActionType {
        ActionType::Disruptive
    }
}

/// `allow`, `allow:phase` or `allow:request`.
#[derive(Debug, Clone, Copy)]
pub struct AllowAction {
    scope: AllowScope,
}

impl Default for AllowAction {
    fn default() -> Self {
        Self {
            scope: AllowScope::All,
        }
    }
}

impl Action for AllowAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        self.scope = match data.trim().to_ascii_lowercase().as_str() {
            "" => AllowScope::All,
            "phase" => AllowScope::Phase,
            "request" => AllowScope::Request,
            other => {
                return Err(ActionError::InvalidArguments(format!(
                    "unknown allow scope '{}'",
                    other
                )))
            }
        };
        Ok(())
    }

    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState) {
        tracing::debug!(rule_id = rule.effective_id(), scope = ?self.scope, "allow");
        tx.allow(self.scope);
    }

    fn action_type(&self) -> ActionType {
        ActionType::Disruptive
    }
}

/// `pass`: continue with the next rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassAction;

impl Action for PassAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        no_arguments(data)
    }

    fn evaluate(&self, _: &RuleMetadata, _: &mut dyn TransactionState) {}

    fn action_type(&self) -> ActionType {
        ActionType::Disruptive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;

    fn rule(id: u64, parent_id: u64, status: u16) -> RuleMetadata {
        RuleMetadata {
            id,
            parent_id,
            status,
            ..RuleMetadata::default()
        }
    }

    #[test]
    fn test_deny_defaults_to_403() {
        let mut tx = TestState::default();
        DenyAction.evaluate(&rule(1, 0, 0), &mut tx);
        let i = tx.interruption.unwrap();
        assert_eq!((i.rule_id, i.action.as_str(), i.status), (1, "deny", 403));
    }

    #[test]
    fn test_deny_uses_parent_id_and_status() {
        let mut tx = TestState::default();
        DenyAction.evaluate(&rule(0, 77, 418), &mut tx);
        let i = tx.interruption.unwrap();
        assert_eq!((i.rule_id, i.status), (77, 418));
    }

    #[test]
    fn test_deny_rejects_arguments() {
        assert_eq!(
            DenyAction.init(&mut RuleMetadata::default(), "403"),
            Err(ActionError::UnexpectedArguments)
        );
    }

    #[test]
    fn test_drop_and_block() {
        let mut tx = TestState::default();
        DropAction.evaluate(&rule(5, 0, 0), &mut tx);
        assert_eq!(tx.interruption.as_ref().unwrap().status, 444);

        let mut tx = TestState::default();
        BlockAction.evaluate(&rule(6, 0, 0), &mut tx);
        let i = tx.interruption.unwrap();
        assert_eq!((i.action.as_str(), i.status), ("block", 403));
    }

    #[test]
    fn test_redirect() {
        let mut action = RedirectAction::default();
        assert_eq!(
            action.init(&mut RuleMetadata::default(), ""),
            Err(ActionError::MissingArguments)
        );
        action
            .init(&mut RuleMetadata::default(), "https://example.com/blocked")
            .unwrap();

        let mut tx = TestState::default();
        action.evaluate(&rule(9, 0, 403), &mut tx);
        let i = tx.interruption.unwrap();
        assert_eq!(i.status, 302);
        assert_eq!(i.data.as_deref(), Some("https://example.com/blocked"));

        let mut tx = TestState::default();
        action.evaluate(&rule(9, 0, 301), &mut tx);
        assert_eq!(tx.interruption.unwrap().status, 301);
    }

    #[test]
    fn test_allow_scopes() {
        let mut action = AllowAction::default();
        action.init(&mut RuleMetadata::default(), "request").unwrap();
        let mut tx = TestState::default();
        action.evaluate(&rule(1, 0, 0), &mut tx);
        assert_eq!(tx.allowed, Some(AllowScope::Request));
        assert!(tx.interruption.is_none());
        assert!(action.init(&mut RuleMetadata::default(), "forever").is_err());
    }

    #[test]
    fn test_first_interruption_wins() {
        let mut tx = TestState::default();
        DenyAction.evaluate(&rule(1, 0, 0), &mut tx);
        DropAction.evaluate(&rule(2, 0, 0), &mut tx);
        assert_eq!(tx.interruption.unwrap().rule_id, 1);
    }
}
