//! Collection traits and the ordered multi-map backing keyed variables.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::parser::VariableName;

/// One value produced by a collection lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchData {
    /// Variable the value came from.
    pub variable: VariableName,
    /// Original-case key, empty for single-valued variables.
    pub key: String,
    /// The value. Lossy text when `raw` is set.
    pub value: String,
    /// Original bytes of a value that is not valid UTF-8.
    #[serde(skip)]
    pub raw: Option<Vec<u8>>,
}

impl MatchData {
    /// Create a match record.
    pub fn new(variable: VariableName, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            variable,
            key: key.into(),
            value: value.into(),
            raw: None,
        }
    }

    /// Attach the original bytes of the value.
    pub fn with_raw(mut self, raw: Option<Vec<u8>>) -> Self {
        self.raw = raw;
        self
    }

    /// The value as operators should see it: the original bytes when known,
    /// otherwise the text.
    pub fn bytes(&self) -> &[u8] {
        self.raw.as_deref().unwrap_or(self.value.as_bytes())
    }

    /// `VAR:key`, or just `VAR` when there is no key.
    pub fn full_name(&self) -> String {
        if self.key.is_empty() {
            self.variable.name().to_string()
        } else {
            format!("{}:{}", self.variable.name(), self.key)
        }
    }
}

/// Split `bytes` into text and, when they are not UTF-8, a copy of the
/// original bytes.
pub(crate) fn text_and_raw(bytes: &[u8]) -> (String, Option<Vec<u8>>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (
            String::from_utf8_lossy(bytes).into_owned(),
            Some(bytes.to_vec()),
        ),
    }
}

/// Read access shared by every collection.
pub trait Collection {
    /// Variable this collection represents.
    fn variable(&self) -> VariableName;

    /// Every value in insertion order.
    fn find_all(&self) -> Vec<MatchData>;
}

/// Collections addressable by key.
pub trait Keyed: Collection {
    /// Values stored under `key`, case-insensitive.
    fn get(&self, key: &str) -> Vec<&str>;

    /// Records for `key`. An empty key returns everything.
    fn find_string(&self, key: &str) -> Vec<MatchData>;

    /// Records whose lower-cased key matches `pattern`.
    fn find_regex(&self, pattern: &Regex) -> Vec<MatchData>;
}

/// A single-valued variable such as `REQUEST_URI`.
#[derive(Debug, Clone)]
pub struct Single {
    variable: VariableName,
    value: String,
    raw: Option<Vec<u8>>,
}

impl Single {
    /// Create an empty single variable.
    pub fn new(variable: VariableName) -> Self {
        Self {
            variable,
            value: String::new(),
            raw: None,
        }
    }

    /// Current value.
    pub fn get(&self) -> &str {
        &self.value
    }

    /// Original bytes, when the last [`set_bytes`](Self::set_bytes) was not
    /// UTF-8.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Replace the value.
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.raw = None;
    }

    /// Replace the value with arbitrary bytes.
    pub fn set_bytes(&mut self, value: &[u8]) {
        (self.value, self.raw) = text_and_raw(value);
    }

    /// Clear the value.
    pub fn reset(&mut self) {
        self.value.clear();
        self.raw = None;
    }
}

impl Collection for Single {
    fn variable(&self) -> VariableName {
        self.variable
    }

    fn find_all(&self) -> Vec<MatchData> {
        vec![MatchData::new(self.variable, "", self.value.clone()).with_raw(self.raw.clone())]
    }
}

#[derive(Debug, Clone)]
pub(crate) struct KeyValue {
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) raw: Option<Vec<u8>>,
}

impl KeyValue {
    fn text(key: &str, value: String) -> Self {
        Self {
            key: key.to_string(),
            value,
            raw: None,
        }
    }
}

/// Ordered multi-map from case-insensitive key to values.
///
/// Keys keep their first-insertion order. Every value remembers the key
/// spelling it was stored with.
#[derive(Debug, Clone)]
pub struct Map {
    variable: VariableName,
    entries: Vec<(String, Vec<KeyValue>)>,
    index: HashMap<String, usize>,
}

impl Map {
    /// Create an empty map bound to `variable`.
    pub fn new(variable: VariableName) -> Self {
        Self {
            variable,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn slot(&mut self, key: &str) -> &mut Vec<KeyValue> {
        let lower = key.to_lowercase();
        let pos = match self.index.get(&lower) {
            Some(&pos) => pos,
            None => {
                self.entries.push((lower.clone(), Vec::new()));
                self.index.insert(lower, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    fn values(&self, key: &str) -> Option<&[KeyValue]> {
        self.index
            .get(&key.to_lowercase())
            .map(|&pos| self.entries[pos].1.as_slice())
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &KeyValue> {
        self.entries.iter().flat_map(|(_, values)| values.iter())
    }

    /// Append `value` under `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let entry = KeyValue::text(key, value.into());
        self.slot(key).push(entry);
    }

    /// Append arbitrary bytes under `key`. Bytes that are not UTF-8 are kept
    /// next to their lossy text.
    pub fn add_bytes(&mut self, key: &str, value: &[u8]) {
        let (value, raw) = text_and_raw(value);
        self.slot(key).push(KeyValue {
            key: key.to_string(),
            value,
            raw,
        });
    }

    pub(crate) fn push_entry(&mut self, entry: KeyValue) {
        let key = entry.key.clone();
        self.slot(&key).push(entry);
    }

    /// Replace every value under `key`. An empty list removes the key.
    pub fn set(&mut self, key: &str, values: Vec<String>) {
        if values.is_empty() {
            self.remove(key);
            return;
        }
        let slot = self.slot(key);
        slot.clear();
        slot.extend(values.into_iter().map(|value| KeyValue::text(key, value)));
    }

    /// Write `value` at position `index` under `key`, appending when `index`
    /// is past the end.
    pub fn set_index(&mut self, key: &str, index: usize, value: impl Into<String>) {
        let entry = KeyValue::text(key, value.into());
        let slot = self.slot(key);
        match slot.get_mut(index) {
            Some(existing) => *existing = entry,
            None => slot.push(entry),
        }
    }

    /// Remove every value under `key`.
    pub fn remove(&mut self, key: &str) {
        let lower = key.to_lowercase();
        if let Some(pos) = self.index.remove(&lower) {
            self.entries.remove(pos);
            for slot in self.index.values_mut() {
                if *slot > pos {
                    *slot -= 1;
                }
            }
        }
    }

    /// Drop all entries. The variable binding is kept.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lower-cased keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    fn record(&self, kv: &KeyValue) -> MatchData {
        MatchData::new(self.variable, kv.key.clone(), kv.value.clone()).with_raw(kv.raw.clone())
    }
}

impl Collection for Map {
    fn variable(&self) -> VariableName {
        self.variable
    }

    fn find_all(&self) -> Vec<MatchData> {
        self.entries().map(|kv| self.record(kv)).collect()
    }
}

impl Keyed for Map {
    fn get(&self, key: &str) -> Vec<&str> {
        self.values(key)
            .map(|values| values.iter().map(|kv| kv.value.as_str()).collect())
            .unwrap_or_default()
    }

    fn find_string(&self, key: &str) -> Vec<MatchData> {
        if key.is_empty() {
            return self.find_all();
        }
        self.values(key)
            .map(|values| values.iter().map(|kv| self.record(kv)).collect())
            .unwrap_or_default()
    }

    fn find_regex(&self, pattern: &Regex) -> Vec<MatchData> {
        self.entries
            .iter()
            .filter(|(key, _)| pattern.is_match(key))
            .flat_map(|(_, values)| values.iter().map(|kv| self.record(kv)))
            .collect()
    }
}
