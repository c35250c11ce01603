//! Error types for zentinel-seclang.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can fail while compiling rules or running a transaction.
#[derive(Debug, Error)]
pub enum Error {
    // Syntax
    /// Malformed rule-language syntax.
    #[error("parse error at {location}: {message}")]
    Parse {
        /// What was wrong.
        message: String,
        /// `file:line:column` of the offending text.
        location: String,
    },

    /// A directive failed to apply; wraps the underlying cause.
    #[error("{directive} at {location}: {source}")]
    Directive {
        /// Directive name as written.
        directive: String,
        /// Where the directive starts.
        location: String,
        /// The failure inside the directive.
        #[source]
        source: Box<Error>,
    },

    /// Directive name not in the registry.
    #[error("unknown directive: {name}")]
    UnknownDirective {
        /// Name as written.
        name: String,
    },

    /// `%{...}` expansion that cannot be compiled.
    #[error("invalid macro: {message}")]
    Macro {
        /// Details.
        message: String,
    },

    /// Bad directive argument or engine setting.
    #[error("configuration error: {message}")]
    Config {
        /// Details.
        message: String,
    },

    // Loading
    /// A rule file, included file or operator data file could not be read.
    #[error("failed to load file {path}: {source}")]
    RuleFileLoad {
        /// Path as resolved.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Too many `Include` expansions under one top-level parse.
    #[error("include recursion limit of {limit} exceeded while including {path}")]
    IncludeRecursion {
        /// Configured maximum.
        limit: usize,
        /// The include that went over it.
        path: String,
    },

    // Compilation
    /// `@rx` pattern rejected by the regex engine.
    #[error("invalid regex pattern '{pattern}': {source}")]
    RegexCompile {
        /// Pattern as written.
        pattern: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },

    /// Phrase list for `@pm` could not be built into an automaton.
    #[error("invalid pattern set: {message}")]
    PatternSet {
        /// Details.
        message: String,
    },

    /// `@ipMatch` entry that is neither an address nor a CIDR network.
    #[error("invalid IP address or network '{value}': {message}")]
    InvalidIp {
        /// Entry as written.
        value: String,
        /// Parser error.
        message: String,
    },

    /// Variable name not known to the engine.
    #[error("unknown variable: {name}")]
    UnknownVariable {
        /// Name as written.
        name: String,
    },

    /// Operator name not in the registry.
    #[error("unknown operator: @{name}")]
    UnknownOperator {
        /// Name without the `@`.
        name: String,
    },

    /// Transformation name not in the registry.
    #[error("unknown transformation: t:{name}")]
    UnknownTransformation {
        /// Name without the `t:` prefix.
        name: String,
    },

    /// Action name not in the registry.
    #[error("unknown action: {name}")]
    UnknownAction {
        /// Name as written.
        name: String,
    },

    /// An action rejected its argument.
    #[error("invalid argument for action '{action}': {message}")]
    InvalidActionArgument {
        /// Action name.
        action: String,
        /// Why the argument was rejected.
        message: String,
    },

    /// `SecRule` or `SecAction` without `id:`.
    #[error("rule is missing required 'id' action")]
    MissingRuleId,

    /// Two rules share an id.
    #[error("duplicate rule id: {id}")]
    DuplicateRuleId {
        /// The repeated id.
        id: u64,
    },

    /// The last rule carried `chain` but nothing followed it.
    #[error("incomplete rule chain: chain action without following rule")]
    IncompleteChain,

    // Runtime
    /// Unknown audit log formatter or writer, or a failed write.
    #[error("audit log error: {message}")]
    AuditLog {
        /// Details.
        message: String,
    },

    /// Unknown body processor, or a body it could not parse.
    #[error("body processor error: {message}")]
    BodyProcessor {
        /// Details.
        message: String,
    },

    /// Input fed to a transaction after `close`.
    #[error("transaction {id} is closed")]
    TransactionClosed {
        /// Transaction id.
        id: String,
    },
}

impl Error {
    /// [`Error::Parse`] from a message and location.
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            location: location.into(),
        }
    }

    /// [`Error::Macro`]
    pub fn macro_error(message: impl Into<String>) -> Self {
        Self::Macro {
            message: message.into(),
        }
    }

    /// [`Error::Config`]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Strip `Directive` wrappers and return the innermost error.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Directive { source, .. } = current {
            current = source.as_ref();
        }
        current
    }
}

/// Where in a rule source something was found. Lines and columns start at 1.
#[derive(Debug, Clone, Default)]
pub struct SourceLocation {
    /// Source file, `None` for inline rule text.
    pub file: Option<PathBuf>,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}
