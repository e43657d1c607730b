//! Error types for syntax validation

use crate::language::Language;
use thiserror::Error;

/// Syntax layer errors
///
/// Only parser setup can fail. Checks themselves report through
/// [`crate::SyntaxCheck`].
#[derive(Debug, Error)]
pub enum SyntaxError {
    /// Grammar could not be loaded into a parser
    #[error("failed to load {language} grammar: {message}")]
    Grammar {
        /// Language whose grammar was rejected
        language: Language,
        /// Underlying message
        message: String,
    },

    /// No grammar for the given name or extension
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

impl SyntaxError {
    /// Create grammar error
    #[inline]
    #[must_use]
    pub fn grammar(language: Language, message: impl Into<String>) -> Self {
        Self::Grammar {
            language,
            message: message.into(),
        }
    }
}
