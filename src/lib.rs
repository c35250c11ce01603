//! # zentinel-seclang
//!
//! SecLang rule compiler and phased transaction engine for web application
//! firewalls.
//!
//! Rules are compiled once into an immutable [`Waf`]; every request gets its
//! own [`Transaction`] that walks the five phases and reports an
//! [`Interruption`](engine::Interruption) when a disruptive action fires.
//!
//! ## Features
//!
//! - `SecRule`, `SecAction`, `Include` and the core configuration directives
//! - Operators, transformations, actions, body processors and audit log
//!   plugins behind an injectable [`Registry`]
//! - Linear-time regex matching with a binary-safe fallback for byte patterns
//! - Rule sets shared lock-free across threads
//!
//! ## Quick Start
//!
//! ```ignore
//! use zentinel_seclang::Waf;
//!
//! let waf = Waf::from_string(r#"
//!     SecRuleEngine On
//!     SecRule ARGS "@rx <script" "id:100,phase:1,deny,status:403"
//! "#)?;
//!
//! let mut tx = waf.new_transaction();
//! tx.process_connection("10.0.0.1", 51234, "10.0.0.2", 80);
//! tx.process_uri("/search?q=<script>", "GET", "HTTP/1.1");
//! tx.add_request_header("Host", "example.com");
//! tx.process_request_headers()?;
//!
//! if let Some(interruption) = tx.interruption() {
//!     println!("blocked by rule {} with {}", interruption.rule_id, interruption.status);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod actions;
pub mod auditlog;
pub mod bodyprocessors;
pub mod engine;
pub mod error;
pub mod fs;
pub mod macros;
pub mod memoize;
pub mod operators;
pub mod parser;
pub mod registry;
pub mod transformations;
pub mod variables;

// Re-export main types at crate root
pub use engine::{Interruption, Transaction, Waf};
pub use error::{Error, Result};
pub use parser::Parser;
pub use registry::Registry;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
