//! Phrase match operators (@pm, @pmFromFile).

use aho_corasick::AhoCorasick;

use super::traits::{data_lines, Operator, OperatorOptions};
use crate::engine::TransactionState;
use crate::error::{Error, Result};

/// Case-insensitive multi-phrase match.
#[derive(Debug, Clone)]
pub struct PmOperator {
    automaton: AhoCorasick,
    patterns: Vec<String>,
}

impl PmOperator {
    /// Build from a list of phrases.
    pub fn new<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = phrases.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            return Err(Error::PatternSet {
                message: "empty pattern list".to_string(),
            });
        }

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| Error::PatternSet {
                message: e.to_string(),
            })?;

        Ok(Self {
            automaton,
            patterns,
        })
    }

    /// `@pm`: space-separated phrases.
    pub fn from_options(options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self::new(options.arguments.split_whitespace())?))
    }

    /// `@pmFromFile`: one phrase per line in each listed file.
    pub fn from_file(options: &OperatorOptions) -> Result<Box<dyn Operator>> {
        let mut phrases = Vec::new();
        for path in options.arguments.split_whitespace() {
            let content = options.read_data_file(path)?;
            phrases.extend(data_lines(&content).map(str::to_string));
        }
        Ok(Box::new(Self::new(phrases)?))
    }

    /// Phrase matched in `value`, if any.
    pub fn find(&self, value: &str) -> Option<&str> {
        self.automaton
            .find(value)
            .map(|m| self.patterns[m.pattern().as_usize()].as_str())
    }
}

impl Operator for PmOperator {
    fn evaluate(&self, tx: &mut dyn TransactionState, value: &str) -> bool {
        match self.find(value) {
            Some(phrase) => {
                if tx.capturing() {
                    tx.capture_field(0, phrase);
                }
                true
            }
            None => false,
        }
    }

    fn evaluate_bytes(&self, tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        match self.automaton.find(value) {
            Some(m) => {
                if tx.capturing() {
                    tx.capture_field(0, &self.patterns[m.pattern().as_usize()]);
                }
                true
            }
            None => false,
        }
    }
}
