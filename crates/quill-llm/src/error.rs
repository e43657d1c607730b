//! Error types for model calls, hooks and summarization

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Completion call failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Provider asked the caller to slow down
    #[error("rate limited by provider{}", retry_suffix(.retry_after))]
    RateLimited {
        /// Provider-suggested wait
        retry_after: Option<Duration>,
    },

    /// Network or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success response
    #[error("provider returned {code}: {message}")]
    Status {
        /// HTTP-like status code
        code: u16,
        /// Provider message
        message: String,
    },

    /// Response carried no choices
    #[error("no response from model")]
    EmptyResponse,

    /// Call abandoned on cancellation
    #[error("model request cancelled")]
    Cancelled,
}

impl ModelError {
    /// Create transport error
    #[inline]
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Whether retrying the same request may succeed
    ///
    /// Clients report overloaded upstreams (5xx) as `Transport`.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::RateLimited { .. } | ModelError::Transport(_))
    }
}

#[allow(clippy::ref_option)]
fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|delay| format!(" (retry after {delay:?})"))
        .unwrap_or_default()
}

/// Metering hook failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// Hook refused the request (quota, billing)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Hook could not be evaluated
    #[error("hook unavailable: {0}")]
    Unavailable(String),
}

/// Plan summarization failure
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Metering vetoed or rejected the call
    #[error("metering rejected plan summary: {0}")]
    Metering(#[from] HookError),

    /// Completion call failed
    #[error("plan summary request failed: {0}")]
    Model(#[from] ModelError),

    /// Params would move the summary watermark backwards
    #[error("conversation ends at {latest} but previous summary covers up to {previous}")]
    StaleWatermark {
        /// Latest message in the params
        latest: DateTime<Utc>,
        /// Watermark of the previous summary
        previous: DateTime<Utc>,
    },

    /// Persistence failed
    #[error("failed to store summary: {0}")]
    Store(String),
}
