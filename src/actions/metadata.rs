//! Metadata and logging actions. They only act at compile time.

use super::{no_arguments, required_argument, Action, ActionError, ActionType};
use crate::engine::{Phase, RuleMetadata, Severity, TransactionState};
use crate::macros::Macro;

type InitResult = std::result::Result<(), ActionError>;

macro_rules! metadata_action {
    ($(#[$doc:meta])* $name:ident, $ty:expr, |$rule:ident, $data:ident| $init:block) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Action for $name {
            fn init(&mut self, $rule: &mut RuleMetadata, $data: &str) -> InitResult $init

            fn evaluate(&self, _: &RuleMetadata, _: &mut dyn TransactionState) {}

            fn action_type(&self) -> ActionType {
                $ty
            }
        }
    };
}

fn small_level(data: &str) -> std::result::Result<u8, ActionError> {
    match required_argument(data)?.trim().parse::<u8>() {
        Ok(n) if (1..=9).contains(&n) => Ok(n),
        _ => Err(ActionError::InvalidArguments(format!(
            "expected a level between 1 and 9, got '{}'",
            data
        ))),
    }
}

fn compile_macro(data: &str) -> std::result::Result<Macro, ActionError> {
    Macro::new(required_argument(data)?).map_err(|e| ActionError::InvalidArguments(e.to_string()))
}

metadata_action!(
    /// `id:N`, a positive rule id.
    IdAction,
    ActionType::Metadata,
    |rule, data| {
        match required_argument(data)?.trim().parse::<u64>() {
            Ok(id) if id > 0 => {
                rule.id = id;
                Ok(())
            }
            _ => Err(ActionError::InvalidArguments(format!(
                "rule id must be a positive integer, got '{}'",
                data
            ))),
        }
    }
);

metadata_action!(
    /// `phase:N` or `phase:request|response|logging`.
    PhaseAction,
    ActionType::Metadata,
    |rule, data| {
        let phase = Phase::parse(required_argument(data)?)
            .ok_or_else(|| ActionError::InvalidArguments(format!("unknown phase '{}'", data)))?;
        rule.phase = phase;
        Ok(())
    }
);

metadata_action!(
    /// `msg:TEXT`, expanded as a macro when the rule matches.
    MsgAction,
    ActionType::Metadata,
    |rule, data| {
        rule.msg = Some(compile_macro(data)?);
        Ok(())
    }
);

metadata_action!(
    /// `logdata:TEXT`, expanded as a macro when the rule matches.
    LogDataAction,
    ActionType::Nondisruptive,
    |rule, data| {
        rule.log_data = Some(compile_macro(data)?);
        Ok(())
    }
);

metadata_action!(
    /// `severity:N` or a severity name.
    SeverityAction,
    ActionType::Metadata,
    |rule, data| {
        let severity = Severity::parse(required_argument(data)?).ok_or_else(|| {
            ActionError::InvalidArguments(format!("unknown severity '{}'", data))
        })?;
        rule.severity = Some(severity);
        Ok(())
    }
);

metadata_action!(
    /// `tag:TEXT`
    TagAction,
    ActionType::Metadata,
    |rule, data| {
        rule.tags.push(required_argument(data)?.to_string());
        Ok(())
    }
);

metadata_action!(
    /// `rev:TEXT`
    RevAction,
    ActionType::Metadata,
    |rule, data| {
        rule.rev = Some(required_argument(data)?.to_string());
        Ok(())
    }
);

metadata_action!(
    /// `ver:TEXT`
    VerAction,
    ActionType::Metadata,
    |rule, data| {
        rule.ver = Some(required_argument(data)?.to_string());
        Ok(())
    }
);

metadata_action!(
    /// `maturity:1-9`
    MaturityAction,
    ActionType::Metadata,
    |rule, data| {
        rule.maturity = Some(small_level(data)?);
        Ok(())
    }
);

metadata_action!(
    /// `accuracy:1-9`
    AccuracyAction,
    ActionType::Metadata,
    |rule, data| {
        rule.accuracy = Some(small_level(data)?);
        Ok(())
    }
);

metadata_action!(
    /// `status:N`, the HTTP status used by disruptive actions.
    StatusAction,
    ActionType::Data,
    |rule, data| {
        match required_argument(data)?.trim().parse::<u16>() {
            Ok(status) if (100..=599).contains(&status) => {
                rule.status = status;
                Ok(())
            }
            _ => Err(ActionError::InvalidArguments(format!(
                "invalid HTTP status '{}'",
                data
            ))),
        }
    }
);

metadata_action!(
    /// `log`
    LogAction,
    ActionType::Nondisruptive,
    |rule, data| {
        no_arguments(data)?;
        rule.log = true;
        Ok(())
    }
);

metadata_action!(
    /// `nolog` also disables audit logging.
    NoLogAction,
    ActionType::Nondisruptive,
    |rule, data| {
        no_arguments(data)?;
        rule.log = false;
        rule.audit_log = false;
        Ok(())
    }
);

metadata_action!(
    /// `auditlog`
    AuditLogAction,
    ActionType::Nondisruptive,
    |rule, data| {
        no_arguments(data)?;
        rule.audit_log = true;
        Ok(())
    }
);

metadata_action!(
    /// `noauditlog`
    NoAuditLogAction,
    ActionType::Nondisruptive,
    |rule, data| {
        no_arguments(data)?;
        rule.audit_log = false;
        Ok(())
    }
);
