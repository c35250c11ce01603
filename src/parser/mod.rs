//! SecLang parser module.
//!
//! This module compiles SecLang configuration into a [`RuleSet`] and
//! [`WafConfig`]:
//! - SecRule: The main rule directive
//! - SecAction: Actions without matching
//! - Include: File inclusion, literal or glob
//! - Configuration directives such as SecRuleEngine
//!
//! ## SecRule Syntax
//!
//! ```text
//! SecRule VARIABLES "OPERATOR" "ACTIONS"
//! ```
//!
//! Where:
//! - VARIABLES: `|`-separated list of variables to inspect
//! - OPERATOR: Pattern to match (e.g., @rx, @contains)
//! - ACTIONS: Comma-separated list of actions (e.g., id:1,deny,log)

mod action;
mod directive;
mod lexer;
mod operator;
mod variable;

pub use action::{parse_actions, ActionSpec};
pub use directive::is_directive;
pub use lexer::{Lexer, Statement};
pub use operator::{OperatorSpec, DEFAULT_OPERATOR};
pub use variable::{parse_targets, RuleTarget, TargetKey, VariableKind, VariableName};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{Rule, RuleAction, RuleOperator, RuleSet, Waf, WafConfig};
use crate::error::{Error, Result, SourceLocation};
use crate::fs::{is_glob, FileSystem, OsFileSystem};
use crate::operators::OperatorOptions;
use crate::registry::Registry;

/// Ceiling on `Include` expansions per top-level parse call.
pub const MAX_INCLUDE_RECURSION: usize = 100;

/// Compiles SecLang sources into an engine.
///
/// ```ignore
/// let mut parser = Parser::new();
/// parser.parse_str("SecRuleEngine On")?;
/// parser.parse_file(Path::new("/etc/waf/rules.conf"))?;
/// let waf = parser.build()?;
/// ```
pub struct Parser {
    registry: Arc<Registry>,
    rules: RuleSet,
    config: WafConfig,
    root: Arc<dyn FileSystem>,
    current_file: Option<PathBuf>,
    include_count: usize,
    rx_multiline: bool,
}

impl Parser {
    /// Parser with the built-in registry and the host filesystem.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Parser resolving names against `registry`.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            rules: RuleSet::new(),
            config: WafConfig::default(),
            root: Arc::new(OsFileSystem),
            current_file: None,
            include_count: 0,
            rx_multiline: true,
        }
    }

    /// Filesystem used by `Include` and file-backed operators.
    pub fn set_root(&mut self, root: Arc<dyn FileSystem>) {
        self.root = root;
    }

    /// Compile `rx` patterns with `(?sm)` (the default) or `(?s)`.
    pub fn set_rx_multiline(&mut self, enabled: bool) {
        self.rx_multiline = enabled;
    }

    /// Rules compiled so far.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Configuration collected so far.
    pub fn config(&self) -> &WafConfig {
        &self.config
    }

    /// Parse a configuration string. Relative includes resolve against the
    /// filesystem root.
    pub fn parse_str(&mut self, input: &str) -> Result<()> {
        self.include_count = 0;
        let previous = self.current_file.take();
        let result = self.parse_source(input);
        self.current_file = previous;
        result
    }

    /// Parse a configuration file read through the filesystem root.
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        self.include_count = 0;
        self.load_file(path)
    }

    /// Finish compilation.
    pub fn build(self) -> Result<Waf> {
        if self.rules.has_open_chain() {
            return Err(Error::IncompleteChain);
        }
        tracing::debug!(
            rules = self.rules.len(),
            rule_engine = ?self.config.rule_engine,
            "rule set compiled"
        );
        Ok(Waf::new(self.registry, self.rules, self.config))
    }

    fn parse_source(&mut self, input: &str) -> Result<()> {
        let file = self.current_file.clone();

        for statement in Lexer::new(input).with_file(file.as_deref()) {
            let statement = statement?;
            let location = SourceLocation {
                file: file.clone(),
                line: statement.line,
                column: statement.column,
            }
            .to_string();
            let handler = directive::lookup(&statement.directive).ok_or_else(|| {
                Error::UnknownDirective {
                    name: statement.directive.clone(),
                }
            });
            let result = handler.and_then(|handler| handler(self, &statement.arguments));
            if let Err(e) = result {
                return Err(Error::Directive {
                    directive: statement.directive,
                    location,
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = self
            .root
            .read_to_string(path)
            .map_err(|source| Error::RuleFileLoad {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "parsing rules file");

        let previous = self.current_file.replace(path.to_path_buf());
        let result = self.parse_source(&content);
        self.current_file = previous;
        result
    }

    /// Resolve `target` against the directory of the file being parsed.
    fn resolve(&self, target: &str) -> PathBuf {
        let candidate = Path::new(target);
        if self.root.is_absolute(candidate) {
            return candidate.to_path_buf();
        }
        match self.current_file.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(candidate),
            None => candidate.to_path_buf(),
        }
    }

    fn current_dir(&self) -> Option<PathBuf> {
        self.current_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }

    pub(crate) fn include(&mut self, target: &str) -> Result<()> {
        self.include_count += 1;
        if self.include_count > MAX_INCLUDE_RECURSION {
            return Err(Error::IncludeRecursion {
                limit: MAX_INCLUDE_RECURSION,
                path: target.to_string(),
            });
        }

        let path = self.resolve(target);
        if !is_glob(target) {
            return self.load_file(&path);
        }

        let pattern = path.to_string_lossy().into_owned();
        let files = self
            .root
            .glob(&pattern)
            .map_err(|source| Error::RuleFileLoad {
                path: path.clone(),
                source,
            })?;
        if files.is_empty() {
            tracing::debug!(pattern = %pattern, "include glob matched no files");
        }
        for file in files {
            self.load_file(&file)?;
        }
        Ok(())
    }

    pub(crate) fn compile_operator(&self, spec: &OperatorSpec) -> Result<RuleOperator> {
        let options = OperatorOptions {
            arguments: spec.argument.clone(),
            root: Arc::clone(&self.root),
            base_dir: self.current_dir(),
            rx_multiline: self.rx_multiline,
        };
        let operator = self.registry.operators.get(&spec.name, &options)?;
        Ok(RuleOperator {
            name: spec.name.clone(),
            argument: spec.argument.clone(),
            negated: spec.negated,
            operator,
        })
    }

    /// Compile an action list onto a new rule and add it to the rule set.
    pub(crate) fn add_rule(
        &mut self,
        targets: Vec<RuleTarget>,
        operator: Option<RuleOperator>,
        actions: &str,
    ) -> Result<()> {
        let mut rule = Rule {
            targets,
            operator,
            ..Rule::default()
        };

        for spec in parse_actions(actions)? {
            if spec.is_transformation() {
                if spec.value.eq_ignore_ascii_case("none") {
                    rule.transformations.clear();
                } else {
                    let transformation = self.registry.transformations.get(&spec.value)?;
                    rule.transformations.push(spec.value, transformation);
                }
                continue;
            }

            let mut action = self.registry.actions.get(&spec.name)?;
            action
                .init(&mut rule.metadata, &spec.value)
                .map_err(|e| Error::InvalidActionArgument {
                    action: spec.name.clone(),
                    message: e.to_string(),
                })?;
            rule.actions.push(RuleAction {
                name: spec.name,
                action,
            });
        }

        self.rules.add(rule)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("rules", &self.rules.len())
            .field("current_file", &self.current_file)
            .field("include_count", &self.include_count)
            .finish()
    }
}
