//! Keyed collections with a names view.

use regex::Regex;
use std::ops::{Deref, DerefMut};

use super::collection::{Collection, Keyed, Map, MatchData};
use crate::parser::{VariableKind, VariableName};

/// A [`Map`] that can also report its keys as values, e.g. `REQUEST_HEADERS`
/// backing `REQUEST_HEADERS_NAMES`.
#[derive(Debug, Clone)]
pub struct NamedCollection {
    map: Map,
    names_variable: VariableName,
}

impl NamedCollection {
    /// Create an empty collection for `variable`.
    pub fn new(variable: VariableName) -> Self {
        let names_variable = VariableName::ALL
            .iter()
            .copied()
            .find(|v| v.kind() == VariableKind::Names(variable))
            .unwrap_or(variable);
        Self {
            map: Map::new(variable),
            names_variable,
        }
    }

    /// Variable reported by [`names`](Self::names).
    pub fn names_variable(&self) -> VariableName {
        self.names_variable
    }

    /// View whose records carry the key as both key and value.
    pub fn names(&self) -> NamedCollectionNames<'_> {
        NamedCollectionNames {
            collection: &self.map,
            variable: self.names_variable,
        }
    }
}

impl Deref for NamedCollection {
    type Target = Map;

    fn deref(&self) -> &Map {
        &self.map
    }
}

impl DerefMut for NamedCollection {
    fn deref_mut(&mut self) -> &mut Map {
        &mut self.map
    }
}

impl Collection for NamedCollection {
    fn variable(&self) -> VariableName {
        self.map.variable()
    }

    fn find_all(&self) -> Vec<MatchData> {
        self.map.find_all()
    }
}

impl Keyed for NamedCollection {
    fn get(&self, key: &str) -> Vec<&str> {
        self.map.get(key)
    }

    fn find_string(&self, key: &str) -> Vec<MatchData> {
        self.map.find_string(key)
    }

    fn find_regex(&self, pattern: &Regex) -> Vec<MatchData> {
        self.map.find_regex(pattern)
    }
}

/// Names view over a [`NamedCollection`].
#[derive(Debug, Clone, Copy)]
pub struct NamedCollectionNames<'a> {
    collection: &'a Map,
    variable: VariableName,
}

impl NamedCollectionNames<'_> {
    fn name_record(&self, key: &str) -> MatchData {
        MatchData::new(self.variable, key, key)
    }
}

impl Collection for NamedCollectionNames<'_> {
    fn variable(&self) -> VariableName {
        self.variable
    }

    fn find_all(&self) -> Vec<MatchData> {
        self.collection
            .entries()
            .map(|kv| self.name_record(&kv.key))
            .collect()
    }
}

impl Keyed for NamedCollectionNames<'_> {
    fn get(&self, key: &str) -> Vec<&str> {
        self.collection
            .entries()
            .filter(|kv| kv.key.eq_ignore_ascii_case(key))
            .map(|kv| kv.key.as_str())
            .collect()
    }

    fn find_string(&self, key: &str) -> Vec<MatchData> {
        if key.is_empty() {
            return self.find_all();
        }
        self.collection
            .entries()
            .filter(|kv| kv.key.to_lowercase() == key.to_lowercase())
            .map(|kv| self.name_record(&kv.key))
            .collect()
    }

    fn find_regex(&self, pattern: &Regex) -> Vec<MatchData> {
        self.collection
            .entries()
            .filter(|kv| pattern.is_match(&kv.key.to_lowercase()))
            .map(|kv| self.name_record(&kv.key))
            .collect()
    }
}
