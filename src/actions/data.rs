//! Actions that carry data into the transaction.

use super::{no_arguments, required_argument, Action, ActionError, ActionType};
use crate::engine::{RuleMetadata, TransactionState};
use crate::macros::Macro;
use crate::variables::Keyed;

/// `capture`: operators of this rule store their capture groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureAction;

impl Action for CaptureAction {
    fn init(&mut self, rule: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        no_arguments(data)?;
        rule.capture = true;
        Ok(())
    }

    fn evaluate(&self, _: &RuleMetadata, _: &mut dyn TransactionState) {}

    fn action_type(&self) -> ActionType {
        ActionType::Nondisruptive
    }
}

/// What `setvar` does with the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetVarOperation {
    /// `tx.key=value`
    #[default]
    Set,
    /// `tx.key=+n`
    Add,
    /// `tx.key=-n`
    Subtract,
    /// `!tx.key`
    Delete,
}

/// `setvar`: write to the `TX` collection. Key and value are macros.
#[derive(Debug, Clone, Default)]
pub struct SetVarAction {
    key: Option<Macro>,
    value: Option<Macro>,
    operation: SetVarOperation,
}

impl SetVarAction {
    /// How the value is applied to the variable.
    pub fn operation(&self) -> SetVarOperation {
        self.operation
    }
}

fn invalid(message: impl Into<String>) -> ActionError {
    ActionError::InvalidArguments(message.into())
}

impl Action for SetVarAction {
    fn init(&mut self, _: &mut RuleMetadata, data: &str) -> Result<(), ActionError> {
        let data = required_argument(data)?.trim();
        let (target, value, operation) = match data.strip_prefix('!') {
            Some(target) => (target, "", SetVarOperation::Delete),
            None => match data.split_once('=') {
                Some((target, value)) => match value.as_bytes().first() {
                    Some(b'+') => (target, &value[1..], SetVarOperation::Add),
                    Some(b'-') => (target, &value[1..], SetVarOperation::Subtract),
                    _ => (target, value, SetVarOperation::Set),
                },
                None => (data, "1", SetVarOperation::Set),
            },
        };

        let (collection, key) = target
            .split_once('.')
            .ok_or_else(|| invalid(format!("expected COLLECTION.key, got '{}'", target)))?;
        if !collection.trim().eq_ignore_ascii_case("tx") {
            return Err(invalid(format!(
                "unsupported collection '{}', only TX is writable",
                collection
            )));
        }
        if key.trim().is_empty() {
            return Err(invalid("empty key"));
        }

        self.key = Some(Macro::new(key.trim()).map_err(|e| invalid(e.to_string()))?);
        self.value = Some(Macro::new(value).map_err(|e| invalid(e.to_string()))?);
        self.operation = operation;
        Ok(())
    }

    fn evaluate(&self, rule: &RuleMetadata, tx: &mut dyn TransactionState) {
        let (Some(key), Some(value)) = (&self.key, &self.value) else {
            return;
        };
        let key = key.expand(tx.variables()).into_owned();
        let value = value.expand(tx.variables()).into_owned();
        let collection = tx.variables_mut().tx_mut();

        match self.operation {
            SetVarOperation::Set => collection.set(&key, vec![value.clone()]),
            SetVarOperation::Delete => collection.remove(&key),
            SetVarOperation::Add | SetVarOperation::Subtract => {
                let current = collection
                    .get(&key)
                    .first()
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .unwrap_or(0);
                let delta = value.trim().parse::<i64>().unwrap_or(0);
                let updated = if self.operation == SetVarOperation::Add {
                    current.saturating_add(delta)
                } else {
                    current.saturating_sub(delta)
                };
                collection.set(&key, vec![updated.to_string()]);
            }
        }

        tracing::trace!(
            rule_id = rule.effective_id(),
            key = %key,
            value = %value,
            operation = ?self.operation,
            "setvar"
        );
    }

    fn action_type(&self) -> ActionType {
        ActionType::Nondisruptive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;

    fn setvar(data: &str) -> SetVarAction {
        let mut action = SetVarAction::default();
        action.init(&mut RuleMetadata::default(), data).unwrap();
        action
    }

    fn tx_value(tx: &TestState, key: &str) -> Vec<String> {
        tx.variables
            .tx()
            .get(key)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_set_and_overwrite() {
        let rule = RuleMetadata::default();
        let mut tx = TestState::default();
        setvar("tx.mode=strict").evaluate(&rule, &mut tx);
        setvar("TX.Mode=relaxed").evaluate(&rule, &mut tx);
        assert_eq!(tx_value(&tx, "mode"), vec!["relaxed"]);
    }

    #[test]
    fn test_bare_key_sets_one() {
        let mut tx = TestState::default();
        setvar("tx.flag").evaluate(&RuleMetadata::default(), &mut tx);
        assert_eq!(tx_value(&tx, "flag"), vec!["1"]);
    }

    #[test]
    fn test_increment_and_decrement() {
        let rule = RuleMetadata::default();
        let mut tx = TestState::default();
        let add = setvar("tx.score=+5");
        assert_eq!(add.operation(), SetVarOperation::Add);
        add.evaluate(&rule, &mut tx);
        add.evaluate(&rule, &mut tx);
        setvar("tx.score=-3").evaluate(&rule, &mut tx);
        assert_eq!(tx_value(&tx, "score"), vec!["7"]);
    }

    #[test]
    fn test_delete() {
        let rule = RuleMetadata::default();
        let mut tx = TestState::default();
        setvar("tx.a=1").evaluate(&rule, &mut tx);
        setvar("!tx.a").evaluate(&rule, &mut tx);
        assert!(tx_value(&tx, "a").is_empty());
    }

    #[test]
    fn test_macro_value() {
        let rule = RuleMetadata::default();
        let mut tx = TestState::default();
        tx.variables.tx_mut().add("limit", "10");
        setvar("tx.copy=%{tx.limit}").evaluate(&rule, &mut tx);
        setvar("tx.score=+%{tx.limit}").evaluate(&rule, &mut tx);
        assert_eq!(tx_value(&tx, "copy"), vec!["10"]);
        assert_eq!(tx_value(&tx, "score"), vec!["10"]);
    }

    #[test]
    fn test_invalid_arguments() {
        let mut rule = RuleMetadata::default();
        let mut action = SetVarAction::default();
        assert_eq!(action.init(&mut rule, ""), Err(ActionError::MissingArguments));
        assert!(matches!(
            action.init(&mut rule, "ip.block=1"),
            Err(ActionError::InvalidArguments(_))
        ));
        assert!(matches!(
            action.init(&mut rule, "score=1"),
            Err(ActionError::InvalidArguments(_))
        ));
        assert!(matches!(
            action.init(&mut rule, "tx.=1"),
            Err(ActionError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_capture_flag() {
        let mut rule = RuleMetadata::default();
        CaptureAction.init(&mut rule, "").unwrap();
        assert!(rule.capture);
    }
}
