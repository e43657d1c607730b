//! Reusable parser handle

use crate::check::{SyntaxCheck, SyntaxIssue, MAX_ISSUES};
use crate::error::SyntaxError;
use crate::language::Language;
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tree-sitter parser bound to one language
///
/// Cloning shares the underlying parser. Parses through one handle are
/// serialized, which matches how a single file is checked: one attempt at a
/// time.
#[derive(Clone)]
pub struct SyntaxParser {
    language: Language,
    inner: Arc<Mutex<tree_sitter::Parser>>,
}

impl SyntaxParser {
    /// Create parser for a language
    ///
    /// # Errors
    /// Returns `SyntaxError::Grammar` if the grammar is incompatible with
    /// the linked tree-sitter runtime.
    pub fn new(language: Language) -> Result<Self, SyntaxError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| SyntaxError::grammar(language, e.to_string()))?;

        Ok(Self {
            language,
            inner: Arc::new(Mutex::new(parser)),
        })
    }

    /// Parser for a path, `None` when the extension has no grammar
    ///
    /// # Errors
    /// Grammar load failure for a detected language.
    pub fn for_path(path: impl AsRef<Path>) -> Result<Option<Self>, SyntaxError> {
        Language::from_path(path).map(Self::new).transpose()
    }

    /// Bound language
    #[inline]
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse and collect issues on the current thread
    ///
    /// A parse that does not produce a tree is reported as
    /// [`SyntaxCheck::TimedOut`].
    #[must_use]
    pub fn check_blocking(&self, content: &str) -> SyntaxCheck {
        self.check_blocking_with_abort(content, &AtomicBool::new(false))
    }

    /// Like [`Self::check_blocking`], halting once `abort` is set
    ///
    /// A halted parse releases the parser and reports
    /// [`SyntaxCheck::TimedOut`]; the next parse starts from scratch.
    #[must_use]
    pub fn check_blocking_with_abort(&self, content: &str, abort: &AtomicBool) -> SyntaxCheck {
        let tree = {
            let mut parser = self.inner.lock();
            let mut halt = |_: &tree_sitter::ParseState| abort.load(Ordering::Relaxed);
            let options = tree_sitter::ParseOptions::new().progress_callback(&mut halt);
            let bytes = content.as_bytes();
            let tree = parser.parse_with_options(
                &mut |offset: usize, _: tree_sitter::Point| bytes.get(offset..).unwrap_or_default(),
                None,
                Some(options),
            );
            if tree.is_none() {
                parser.reset();
            }
            tree
        };

        let Some(tree) = tree else {
            return SyntaxCheck::TimedOut;
        };

        let root = tree.root_node();
        if !root.has_error() {
            return SyntaxCheck::Valid;
        }

        let mut issues = Vec::new();
        collect_issues(root, content, &mut issues);
        if issues.is_empty() {
            issues.push(SyntaxIssue::from_node(root, content));
        }
        SyntaxCheck::Invalid(issues)
    }
}

impl fmt::Debug for SyntaxParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxParser")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

/// Depth-first walk into subtrees that contain errors
fn collect_issues(node: tree_sitter::Node<'_>, source: &str, issues: &mut Vec<SyntaxIssue>) {
    if issues.len() >= MAX_ISSUES {
        return;
    }
    if node.is_error() || node.is_missing() {
        issues.push(SyntaxIssue::from_node(node, source));
        return;
    }
    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_issues(child, source, issues);
    }
}
