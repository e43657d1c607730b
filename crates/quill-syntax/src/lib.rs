//! Quill Syntax
//!
//! Syntax validation of edited files with tree-sitter grammars.
//!
//! # Core Concepts
//!
//! - [`Language`]: detected from a path, maps to a bundled grammar
//! - [`SyntaxParser`]: reusable per-file parser handle
//! - [`SyntaxValidator`]: async check bounded by a timeout
//! - [`SyntaxCheck`]: `Valid`, `Invalid(issues)` or `TimedOut`
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_syntax::{SyntaxParser, SyntaxValidator, TreeSitterValidator};
//! use std::time::Duration;
//!
//! let parser = SyntaxParser::for_path("src/lib.rs")?.expect("rust grammar");
//! let check = TreeSitterValidator::new()
//!     .check(&parser, "fn main() {}", Duration::from_secs(5))
//!     .await;
//! assert!(check.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod check;
mod error;
mod language;
mod parser;
mod validator;

pub use check::{IssueKind, SyntaxCheck, SyntaxIssue, MAX_ISSUES};
pub use error::SyntaxError;
pub use language::Language;
pub use parser::SyntaxParser;
pub use validator::{SyntaxValidator, TreeSitterValidator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
