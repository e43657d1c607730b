//! Error types for build orchestration

use crate::state::{AbandonReason, BuildState};
use quill_llm::{HookError, ModelError};
use quill_providers::{ModelId, ModelRole};
use thiserror::Error;

/// Terminal failure of one file's build
#[derive(Debug, Error)]
pub enum BuildError {
    /// Resolver returned no provider with a client
    #[error("no provider available for {role} ({model_id})")]
    NoProviderAvailable {
        /// Role being served
        role: ModelRole,
        /// Model of that role
        model_id: ModelId,
    },

    /// Metering vetoed the request
    #[error("metering rejected build request: {0}")]
    MeteringRejected(#[source] HookError),

    /// Model requests failed on every attempt
    #[error("model request failed after {attempts} attempts: {source}")]
    TransportExhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure
        #[source]
        source: ModelError,
    },

    /// Structured and whole-file budgets both spent
    #[error("retry budget exhausted after {structured} structured and {whole_file} whole-file retries")]
    RetryBudgetExhausted {
        /// Structured retries used
        structured: u32,
        /// Whole-file retries used
        whole_file: u32,
    },

    /// Build stream cancelled
    #[error("build cancelled")]
    Cancelled,

    /// Illegal transition attempted
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

impl BuildError {
    /// Sub-reason recorded on the abandoned file
    #[must_use]
    pub fn abandon_reason(&self) -> AbandonReason {
        match self {
            BuildError::NoProviderAvailable { .. } => AbandonReason::NoProviderAvailable,
            BuildError::MeteringRejected(_) => AbandonReason::MeteringRejected,
            BuildError::TransportExhausted { .. } => AbandonReason::TransportExhausted,
            BuildError::RetryBudgetExhausted { .. } => AbandonReason::RetryBudgetExhausted,
            BuildError::Cancelled => AbandonReason::Cancelled,
            BuildError::StateMachine(_) => AbandonReason::Internal,
        }
    }
}

/// Candidate edit could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// Response is not a valid edit
    #[error("malformed edit: {0}")]
    Malformed(String),

    /// Replacement target absent from the content
    #[error("text to replace not found: `{0}`")]
    NotFound(String),

    /// Replacement target occurs more than once
    #[error("text to replace occurs {count} times, expected once: `{old}`")]
    Ambiguous {
        /// Target text
        old: String,
        /// Occurrences
        count: usize,
    },

    /// Nothing to apply
    #[error("edit is empty")]
    Empty,
}

/// Build state machine fault
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    /// Transition not in the allowed table
    #[error("illegal build state transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: BuildState,
        /// Requested state
        to: BuildState,
    },
}

/// Build record persistence failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend unreachable
    #[error("build record store unavailable: {0}")]
    Unavailable(String),

    /// Record rejected by the backend
    #[error("build record rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abandon_reason_mapping() {
        assert_eq!(BuildError::Cancelled.abandon_reason(), AbandonReason::Cancelled);
        assert_eq!(
            BuildError::RetryBudgetExhausted {
                structured: 3,
                whole_file: 4
            }
            .abandon_reason(),
            AbandonReason::RetryBudgetExhausted
        );
        assert_eq!(
            BuildError::TransportExhausted {
                attempts: 3,
                source: ModelError::transport("reset")
            }
            .abandon_reason(),
            AbandonReason::TransportExhausted
        );
        assert_eq!(
            BuildError::MeteringRejected(HookError::Rejected("quota".into())).abandon_reason(),
            AbandonReason::MeteringRejected
        );
    }

    #[test]
    fn messages() {
        let err = BuildError::RetryBudgetExhausted {
            structured: 3,
            whole_file: 4,
        };
        assert_eq!(
            err.to_string(),
            "retry budget exhausted after 3 structured and 4 whole-file retries"
        );
        assert_eq!(
            EditError::Ambiguous {
                old: "x".into(),
                count: 2
            }
            .to_string(),
            "text to replace occurs 2 times, expected once: `x`"
        );
    }
}
