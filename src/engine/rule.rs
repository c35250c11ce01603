//! Compiled rules.

use serde::Serialize;
use std::fmt;

use super::phase::Phase;
use crate::actions::{Action, ActionType};
use crate::macros::Macro;
use crate::operators::Operator;
use crate::parser::RuleTarget;
use crate::transformations::TransformationPipeline;

/// Rule severity, 0 (most severe) to 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    /// 0
    Emergency = 0,
    /// 1
    Alert = 1,
    /// 2
    Critical = 2,
    /// 3
    Error = 3,
    /// 4
    Warning = 4,
    /// 5
    Notice = 5,
    /// 6
    Info = 6,
    /// 7
    Debug = 7,
}

impl Severity {
    const ALL: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    /// Parse a number (0-7) or a case-insensitive name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return Self::ALL.get(n).copied();
        }
        Self::ALL
            .iter()
            .copied()
            .find(|sev| sev.name().eq_ignore_ascii_case(s))
    }

    /// Numeric level.
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Upper-case name, e.g. `CRITICAL`.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata filled in by a rule's actions at compile time.
#[derive(Debug, Clone)]
pub struct RuleMetadata {
    /// Rule id; 0 for chain children.
    pub id: u64,
    /// Id of the chain head, 0 for top-level rules.
    pub parent_id: u64,
    /// Phase the rule runs in.
    pub phase: Phase,
    /// `msg:`, expanded when the rule matches.
    pub msg: Option<Macro>,
    /// `logdata:`, expanded when the rule matches.
    pub log_data: Option<Macro>,
    /// `severity:`
    pub severity: Option<Severity>,
    /// `tag:` values in declaration order.
    pub tags: Vec<String>,
    /// `rev:`
    pub rev: Option<String>,
    /// `ver:`
    pub ver: Option<String>,
    /// `maturity:`, 1-9.
    pub maturity: Option<u8>,
    /// `accuracy:`, 1-9.
    pub accuracy: Option<u8>,
    /// Status for disruptive actions; 0 means the action's default.
    pub status: u16,
    /// Operators store capture groups while this rule is evaluated.
    pub capture: bool,
    /// Matches go to the error log.
    pub log: bool,
    /// Matches go to the audit log.
    pub audit_log: bool,
    /// The next rule statement is linked as this rule's chain child.
    pub has_chain: bool,
}

impl Default for RuleMetadata {
    fn default() -> Self {
        Self {
            id: 0,
            parent_id: 0,
            phase: Phase::default(),
            msg: None,
            log_data: None,
            severity: None,
            tags: Vec::new(),
            rev: None,
            ver: None,
            maturity: None,
            accuracy: None,
            status: 0,
            capture: false,
            log: true,
            audit_log: true,
            has_chain: false,
        }
    }
}

impl RuleMetadata {
    /// Id reported for this rule: its own, or the chain head's.
    pub fn effective_id(&self) -> u64 {
        if self.id == 0 {
            self.parent_id
        } else {
            self.id
        }
    }
}

/// The operator test of a rule.
pub struct RuleOperator {
    /// Registry name, e.g. `rx`.
    pub name: String,
    /// Raw argument text.
    pub argument: String,
    /// Written with a leading `!`.
    pub negated: bool,
    /// The compiled operator.
    pub operator: Box<dyn Operator>,
}

impl fmt::Debug for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleOperator")
            .field("name", &self.name)
            .field("argument", &self.argument)
            .field("negated", &self.negated)
            .finish()
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        write!(f, "@{}", self.name)?;
        if !self.argument.is_empty() {
            write!(f, " {}", self.argument)?;
        }
        Ok(())
    }
}

/// A compiled action with the name it was declared under.
pub struct RuleAction {
    /// Name as declared, lower-cased.
    pub name: String,
    /// The compiled action.
    pub action: Box<dyn Action>,
}

impl RuleAction {
    /// Category of the wrapped action.
    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleAction")
            .field("name", &self.name)
            .field("type", &self.action.action_type())
            .finish()
    }
}

/// A compiled rule. `SecAction` rules have no targets and no operator.
#[derive(Debug, Default)]
pub struct Rule {
    /// Compile-time metadata.
    pub metadata: RuleMetadata,
    /// Variables the operator runs against.
    pub targets: Vec<RuleTarget>,
    /// `None` for `SecAction`.
    pub operator: Option<RuleOperator>,
    /// `t:` steps applied to each value before the operator.
    pub transformations: TransformationPipeline,
    /// Non-metadata actions in declaration order.
    pub actions: Vec<RuleAction>,
    /// Next link of the chain, owned by this rule.
    pub chain: Option<Box<Rule>>,
}

impl Rule {
    /// Declared id, 0 for chain children.
    pub fn id(&self) -> u64 {
        self.metadata.id
    }

    /// Phase from the metadata.
    pub fn phase(&self) -> Phase {
        self.metadata.phase
    }

    /// Last rule of the chain starting here.
    pub fn tail_mut(&mut self) -> &mut Rule {
        match self.chain {
            Some(ref mut next) => next.tail_mut(),
            None => self,
        }
    }

    /// Rules of the chain starting here, head first.
    pub fn links(&self) -> impl Iterator<Item = &Rule> {
        std::iter::successors(Some(self), |rule| rule.chain.as_deref())
    }

    /// Whether the chain starting here still expects another link.
    pub fn has_open_chain(&self) -> bool {
        self.links().last().map_or(false, |r| r.metadata.has_chain)
    }

    /// Whether any action of this rule is disruptive.
    pub fn is_disruptive(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type() == ActionType::Disruptive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("2"), Some(Severity::Critical));
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("8"), None);
        assert_eq!(Severity::parse("loud"), None);
    }

    #[test]
    fn test_effective_id() {
        let mut m = RuleMetadata::default();
        m.parent_id = 7;
        assert_eq!(m.effective_id(), 7);
        m.id = 9;
        assert_eq!(m.effective_id(), 9);
    }

    #[test]
    fn test_chain_links() {
        let mut head = Rule::default();
        head.metadata.id = 1;
        head.metadata.has_chain = true;
        assert!(head.has_open_chain());

        let mut child = Rule::default();
        child.metadata.parent_id = 1;
        head.tail_mut().chain = Some(Box::new(child));
        assert!(!head.has_open_chain());
        assert_eq!(head.links().count(), 2);
        assert_eq!(head.tail_mut().metadata.parent_id, 1);
    }
}
