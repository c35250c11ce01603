//! Operator trait and construction options.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::TransactionState;
use crate::error::{Error, Result};
use crate::fs::FileSystem;

/// A compiled rule operator.
pub trait Operator: Send + Sync {
    /// Test `value`. May write capture groups into `tx`.
    fn evaluate(&self, tx: &mut dyn TransactionState, value: &str) -> bool;

    /// Test raw bytes. Unless overridden, bytes that are not UTF-8 are
    /// tested as lossy text.
    fn evaluate_bytes(&self, tx: &mut dyn TransactionState, value: &[u8]) -> bool {
        self.evaluate(tx, &String::from_utf8_lossy(value))
    }
}

/// Inputs handed to an operator factory.
#[derive(Debug, Clone)]
pub struct OperatorOptions {
    /// Raw argument text after the operator name.
    pub arguments: String,
    /// Filesystem used by file-backed operators.
    pub root: Arc<dyn FileSystem>,
    /// Directory of the rule file being compiled.
    pub base_dir: Option<PathBuf>,
    /// Prefix `rx` patterns with `(?sm)` instead of `(?s)`.
    pub rx_multiline: bool,
}

impl OperatorOptions {
    /// Options with the host filesystem and legacy multiline mode.
    pub fn new(arguments: impl Into<String>) -> Self {
        Self {
            arguments: arguments.into(),
            root: Arc::new(crate::fs::OsFileSystem),
            base_dir: None,
            rx_multiline: true,
        }
    }

    /// Resolve `path` against the rule file's directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match &self.base_dir {
            Some(dir) if !self.root.is_absolute(candidate) => dir.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    /// Read a data file referenced by the arguments.
    pub fn read_data_file(&self, path: &str) -> Result<String> {
        let resolved = self.resolve_path(path.trim());
        self.root
            .read_to_string(&resolved)
            .map_err(|source| Error::RuleFileLoad {
                path: resolved,
                source,
            })
    }
}

/// Lines of a data file with blanks and `#` comments removed.
pub(crate) fn data_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}
