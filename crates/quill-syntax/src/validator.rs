//! Async syntax validation

use crate::check::SyntaxCheck;
use crate::parser::SyntaxParser;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Syntax validation collaborator
#[async_trait]
pub trait SyntaxValidator: Send + Sync {
    /// Check `content` with `parser`, giving up after `timeout`
    async fn check(&self, parser: &SyntaxParser, content: &str, timeout: Duration) -> SyntaxCheck;
}

/// Validator running tree-sitter on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterValidator;

impl TreeSitterValidator {
    /// Create validator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SyntaxValidator for TreeSitterValidator {
    async fn check(&self, parser: &SyntaxParser, content: &str, timeout: Duration) -> SyntaxCheck {
        let parser = parser.clone();
        let content = content.to_string();
        let language = parser.language();
        let abort = AbortOnDrop::default();
        let flag = Arc::clone(&abort.0);
        let task =
            tokio::task::spawn_blocking(move || parser.check_blocking_with_abort(&content, &flag));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(check)) => check,
            Ok(Err(e)) => {
                tracing::warn!(%language, error = %e, "syntax check task failed");
                SyntaxCheck::TimedOut
            }
            Err(_) => {
                tracing::warn!(%language, ?timeout, "syntax check timed out");
                SyntaxCheck::TimedOut
            }
        }
    }
}

/// Halts the blocking parse when the check is abandoned
#[derive(Default)]
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
