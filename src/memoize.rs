//! Process-wide cache of compiled patterns.
//!
//! Rule sets repeat the same regex fragments many times. Compiled objects are
//! keyed by their source text and shared across every parser in the process.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Concurrent cache keyed by source text.
#[derive(Debug)]
pub struct Memoizer<T> {
    cache: DashMap<String, Arc<T>>,
}

impl<T> Default for Memoizer<T> {
    fn default() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }
}

impl<T> Memoizer<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, building it with `build` on a miss.
    ///
    /// `build` runs without holding a shard lock, so two threads may build
    /// the same key concurrently; the first insert is kept.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &str,
        build: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<Arc<T>, E> {
        if let Some(hit) = self.cache.get(key) {
            return Ok(Arc::clone(hit.value()));
        }
        let built = Arc::new(build()?);
        let entry = self.cache.entry(key.to_string()).or_insert(built);
        Ok(Arc::clone(entry.value()))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }
}

/// Compiled text regexes.
pub static TEXT_REGEXES: Lazy<Memoizer<regex::Regex>> = Lazy::new(Memoizer::new);

/// Compiled byte regexes.
pub static BYTE_REGEXES: Lazy<Memoizer<regex::bytes::Regex>> = Lazy::new(Memoizer::new);
