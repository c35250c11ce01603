//! The compiled rule set owned by an engine.

use std::collections::HashSet;

use super::phase::Phase;
use super::rule::Rule;
use crate::error::{Error, Result};

/// Top-level rules in declaration order. Chain children hang off their
/// head.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    ids: HashSet<u64>,
}

impl RuleSet {
    /// Empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compiled rule.
    ///
    /// When the last rule's chain is still open, `rule` becomes its next
    /// link, taking the head's phase and id as parent. Otherwise it must
    /// carry a non-zero id not used by any other top-level rule.
    pub fn add(&mut self, mut rule: Rule) -> Result<()> {
        if let Some(head) = self.rules.last_mut() {
            if head.has_open_chain() {
                rule.metadata.parent_id = head.metadata.id;
                rule.metadata.phase = head.metadata.phase;
                tracing::trace!(parent_id = head.metadata.id, "rule chained");
                head.tail_mut().chain = Some(Box::new(rule));
                return Ok(());
            }
        }

        let id = rule.metadata.id;
        if id == 0 {
            return Err(Error::MissingRuleId);
        }
        if !self.ids.insert(id) {
            return Err(Error::DuplicateRuleId { id });
        }
        tracing::trace!(rule_id = id, phase = %rule.metadata.phase, "rule added");
        self.rules.push(rule);
        Ok(())
    }

    /// Whether the last rule still waits for a chain link.
    pub fn has_open_chain(&self) -> bool {
        self.rules.last().map_or(false, Rule::has_open_chain)
    }

    /// Remove the rule with `id`. Returns whether one was removed.
    pub fn remove_by_id(&mut self, id: u64) -> bool {
        self.remove_by_range(id, id) > 0
    }

    /// Remove every rule with an id in `start..=end`. Returns the count.
    pub fn remove_by_range(&mut self, start: u64, end: u64) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| !(start..=end).contains(&rule.metadata.id));
        self.ids.retain(|id| !(start..=end).contains(id));
        before - self.rules.len()
    }

    /// Top-level rules of `phase` in declaration order.
    pub fn rules_for_phase(&self, phase: Phase) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |rule| rule.metadata.phase == phase)
    }

    /// Top-level rule with `id`.
    pub fn get(&self, id: u64) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.metadata.id == id)
    }

    /// All top-level rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of top-level rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule has been added.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: u64, phase: Phase, chain: bool) -> Rule {
        let mut rule = Rule::default();
        rule.metadata.id = id;
        rule.metadata.phase = phase;
        rule.metadata.has_chain = chain;
        rule
    }

    #[test]
    fn test_add_requires_unique_id() {
        let mut set = RuleSet::new();
        set.add(rule(1, Phase::RequestHeaders, false)).unwrap();
        assert!(matches!(
            set.add(rule(0, Phase::RequestHeaders, false)),
            Err(Error::MissingRuleId)
        ));
        assert!(matches!(
            set.add(rule(1, Phase::RequestBody, false)),
            Err(Error::DuplicateRuleId { id: 1 })
        ));
    }

    #[test]
    fn test_chain_attaches_to_head() {
        let mut set = RuleSet::new();
        set.add(rule(10, Phase::RequestHeaders, true)).unwrap();
        assert!(set.has_open_chain());
        set.add(rule(0, Phase::RequestBody, true)).unwrap();
        set.add(rule(0, Phase::RequestBody, false)).unwrap();
        assert!(!set.has_open_chain());
        assert_eq!(set.len(), 1);

        let head = set.get(10).unwrap();
        let links: Vec<_> = head.links().collect();
        assert_eq!(links.len(), 3);
        assert!(links[1..]
            .iter()
            .all(|r| r.metadata.parent_id == 10 && r.phase() == Phase::RequestHeaders));
    }

    #[test]
    fn test_rules_for_phase_keeps_order() {
        let mut set = RuleSet::new();
        set.add(rule(3, Phase::RequestBody, false)).unwrap();
        set.add(rule(1, Phase::RequestHeaders, false)).unwrap();
        set.add(rule(2, Phase::RequestBody, false)).unwrap();
        let ids: Vec<u64> = set.rules_for_phase(Phase::RequestBody).map(Rule::id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_remove() {
        let mut set = RuleSet::new();
        for id in [1, 5, 7, 9] {
            set.add(rule(id, Phase::RequestHeaders, false)).unwrap();
        }
        assert!(set.remove_by_id(1));
        assert!(!set.remove_by_id(1));
        assert_eq!(set.remove_by_range(5, 8), 2);
        assert_eq!(set.len(), 1);
        set.add(rule(5, Phase::RequestHeaders, false)).unwrap();
    }
}
