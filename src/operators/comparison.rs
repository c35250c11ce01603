//! String and numeric comparison operators.
//!
//! Arguments are macros, expanded against the transaction on every call, so
//! `@eq %{tx.threshold}` compares against the current value.

use super::traits::{Operator, OperatorOptions};
use crate::engine::TransactionState;
use crate::error::Result;
use crate::macros::Macro;

/// String comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringComparison {
    /// `@contains`
    Contains,
    /// `@streq`
    Equals,
    /// `@beginsWith`
    BeginsWith,
    /// `@endsWith`
    EndsWith,
    /// `@within`: the value occurs inside the argument.
    Within,
}

/// String comparison operator.
#[derive(Debug, Clone)]
pub struct StringOperator {
    kind: StringComparison,
    argument: Macro,
}

impl StringOperator {
    /// Compile the argument of a `kind` comparison.
    pub fn new(kind: StringComparison, argument: &str) -> Result<Self> {
        Ok(Self {
            kind,
            argument: Macro::new(argument)?,
        })
    }

    /// Registry factory for `kind`.
    pub fn factory(
        kind: StringComparison,
    ) -> impl Fn(&OperatorOptions) -> Result<Box<dyn Operator>> + Send + Sync + 'static {
        move |options| Ok(Box::new(Self::new(kind, &options.arguments)?) as Box<dyn Operator>)
    }
}

impl Operator for StringOperator {
    fn evaluate(&self, tx: &mut dyn TransactionState, value: &str) -> bool {
        let argument = self.argument.expand(tx.variables());
        let matched = match self.kind {
            StringComparison::Contains => value.contains(argument.as_ref()),
            StringComparison::Equals => value == argument,
            StringComparison::BeginsWith => value.starts_with(argument.as_ref()),
            StringComparison::EndsWith => value.ends_with(argument.as_ref()),
            StringComparison::Within => !value.is_empty() && argument.contains(value),
        };
        if matched && tx.capturing() {
            tx.capture_field(0, value);
        }
        matched
    }
}

/// Numeric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericComparison {
    /// `@eq`
    Eq,
    /// `@ne`
    Ne,
    /// `@gt`
    Gt,
    /// `@ge`
    Ge,
    /// `@lt`
    Lt,
    /// `@le`
    Le,
}

/// Numeric comparison operator. Values that do not parse count as 0.
#[derive(Debug, Clone)]
pub struct NumericOperator {
    kind: NumericComparison,
    argument: Macro,
}

impl NumericOperator {
    /// Compile the argument of a `kind` comparison.
    pub fn new(kind: NumericComparison, argument: &str) -> Result<Self> {
        Ok(Self {
            kind,
            argument: Macro::new(argument)?,
        })
    }

    /// Registry factory for `kind`.
    pub fn factory(
        kind: NumericComparison,
    ) -> impl Fn(&OperatorOptions) -> Result<Box<dyn Operator>> + Send + Sync + 'static {
        move |options| Ok(Box::new(Self::new(kind, &options.arguments)?) as Box<dyn Operator>)
    }
}

fn to_number(s: &str) -> i64 {
    s.trim().parse().unwrap_or(0)
}

impl Operator for NumericOperator {
    fn evaluate(&self, tx: &mut dyn TransactionState, value: &str) -> bool {
        let expected = to_number(&self.argument.expand(tx.variables()));
        let actual = to_number(value);
        match self.kind {
            NumericComparison::Eq => actual == expected,
            NumericComparison::Ne => actual != expected,
            NumericComparison::Gt => actual > expected,
            NumericComparison::Ge => actual >= expected,
            NumericComparison::Lt => actual < expected,
            NumericComparison::Le => actual <= expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::TestState;

    fn check(kind: StringComparison, arg: &str, value: &str) -> bool {
        let op = StringOperator::new(kind, arg).unwrap();
        op.evaluate(&mut TestState::default(), value)
    }

    #[test]
    fn test_contains() {
        assert!(check(StringComparison::Contains, "admin", "/admin/users"));
        assert!(!check(StringComparison::Contains, "admin", "/users"));
    }

    #[test]
    fn test_begins_and_ends_with() {
        assert!(check(StringComparison::BeginsWith, "/admin", "/admin/users"));
        assert!(!check(StringComparison::BeginsWith, "/admin", "/users/admin"));
        assert!(check(StringComparison::EndsWith, ".php", "index.php"));
        assert!(!check(StringComparison::EndsWith, ".php", "index.html"));
    }

    #[test]
    fn test_streq_is_case_sensitive() {
        assert!(check(StringComparison::Equals, "admin", "admin"));
        assert!(!check(StringComparison::Equals, "admin", "Admin"));
    }

    #[test]
    fn test_within() {
        assert!(check(StringComparison::Within, "GET POST HEAD", "POST"));
        assert!(!check(StringComparison::Within, "GET POST HEAD", "PUT"));
        assert!(!check(StringComparison::Within, "GET POST HEAD", ""));
    }

    #[test]
    fn test_numeric_operators() {
        let mut tx = TestState::default();
        let eval = |kind, arg: &str, value: &str, tx: &mut TestState| {
            NumericOperator::new(kind, arg).unwrap().evaluate(tx, value)
        };
        assert!(eval(NumericComparison::Eq, "10", "10", &mut tx));
        assert!(!eval(NumericComparison::Eq, "10", "11", &mut tx));
        assert!(eval(NumericComparison::Ne, "10", "11", &mut tx));
        assert!(eval(NumericComparison::Gt, "10", "11", &mut tx));
        assert!(!eval(NumericComparison::Gt, "10", "10", &mut tx));
        assert!(eval(NumericComparison::Ge, "10", "10", &mut tx));
        assert!(eval(NumericComparison::Lt, "10", "9", &mut tx));
        assert!(eval(NumericComparison::Le, "10", "10", &mut tx));
        assert!(eval(NumericComparison::Eq, "0", "not-a-number", &mut tx));
    }

    #[test]
    fn test_numeric_macro_argument() {
        let mut tx = TestState::default();
        tx.variables.tx_mut().add("threshold", "5");
        let op = NumericOperator::new(NumericComparison::Ge, "%{tx.threshold}").unwrap();
        assert!(op.evaluate(&mut tx, "7"));
        assert!(!op.evaluate(&mut tx, "4"));
    }
}
