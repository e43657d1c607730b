//! Per-file build states and transitions

use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one file's build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Requesting a candidate edit
    Editing,
    /// Checking the edited content
    Validating,
    /// Waiting to retry with a structured edit
    RetryStructured,
    /// Waiting to retry with a whole-file rewrite
    RetryWholeFile,
    /// Terminal success
    Applied,
    /// Terminal failure
    Abandoned,
}

impl BuildState {
    /// Initial state
    pub const INITIAL: BuildState = BuildState::Editing;

    /// True for `Applied` and `Abandoned`
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Applied | BuildState::Abandoned)
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Editing => "editing",
            BuildState::Validating => "validating",
            BuildState::RetryStructured => "retry_structured",
            BuildState::RetryWholeFile => "retry_whole_file",
            BuildState::Applied => "applied",
            BuildState::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: BuildState) -> &'static [BuildState] {
    use BuildState::{Abandoned, Applied, Editing, RetryStructured, RetryWholeFile, Validating};
    match from {
        Editing => &[Validating, Abandoned],
        Validating => &[Applied, RetryStructured, RetryWholeFile, Abandoned],
        RetryStructured | RetryWholeFile => &[Editing, Abandoned],
        Applied | Abandoned => &[],
    }
}

/// Validate a state transition
///
/// # Errors
/// `StateMachineError::IllegalTransition` when `to` is not reachable from
/// `from`.
pub fn validate_transition(from: BuildState, to: BuildState) -> Result<(), StateMachineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// Edit strategy of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStrategy {
    /// Targeted replacements in the existing content
    #[default]
    Structured,
    /// Complete new content
    WholeFile,
}

impl fmt::Display for EditStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditStrategy::Structured => "structured",
            EditStrategy::WholeFile => "whole_file",
        })
    }
}

/// How far an applied result was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Parsed without errors
    Verified,
    /// Invalid, but so was the content before the edit
    PreExistingInvalid,
    /// No grammar for the file's language
    Unsupported,
}

impl Verification {
    /// Whether the result was syntax-checked clean
    #[inline]
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

/// Why a file was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// Both retry budgets spent
    RetryBudgetExhausted,
    /// Model requests kept failing
    TransportExhausted,
    /// No provider can serve the role
    NoProviderAvailable,
    /// Metering vetoed a request
    MeteringRejected,
    /// Build stream was cancelled
    Cancelled,
    /// Internal state machine fault
    Internal,
}

/// Terminal outcome of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Content written
    Applied {
        /// Final file content
        content: String,
        /// Check level
        verification: Verification,
    },
    /// Given up
    Abandoned {
        /// Sub-reason
        reason: AbandonReason,
        /// Error message
        message: String,
    },
}

impl BuildOutcome {
    /// True for `Applied`
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, BuildOutcome::Applied { .. })
    }

    /// Abandon reason, if abandoned
    #[must_use]
    pub fn abandon_reason(&self) -> Option<AbandonReason> {
        match self {
            BuildOutcome::Applied { .. } => None,
            BuildOutcome::Abandoned { reason, .. } => Some(*reason),
        }
    }

    /// Final content, if applied
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            BuildOutcome::Applied { content, .. } => Some(content),
            BuildOutcome::Abandoned { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [BuildState; 6] = [
        BuildState::Editing,
        BuildState::Validating,
        BuildState::RetryStructured,
        BuildState::RetryWholeFile,
        BuildState::Applied,
        BuildState::Abandoned,
    ];

    #[test]
    fn happy_path() {
        assert!(validate_transition(BuildState::Editing, BuildState::Validating).is_ok());
        assert!(validate_transition(BuildState::Validating, BuildState::Applied).is_ok());
    }

    #[test]
    fn retry_loops_back_to_editing() {
        assert!(validate_transition(BuildState::Validating, BuildState::RetryStructured).is_ok());
        assert!(validate_transition(BuildState::RetryStructured, BuildState::Editing).is_ok());
        assert!(validate_transition(BuildState::RetryWholeFile, BuildState::Editing).is_ok());
    }

    #[test]
    fn editing_cannot_skip_validation() {
        let err = validate_transition(BuildState::Editing, BuildState::Applied).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::IllegalTransition {
                from: BuildState::Editing,
                to: BuildState::Applied
            }
        );
    }

    #[test]
    fn terminal_states_are_final() {
        for state in ALL {
            assert!(validate_transition(BuildState::Applied, state).is_err());
            assert!(validate_transition(BuildState::Abandoned, state).is_err());
        }
    }

    #[test]
    fn every_non_terminal_state_can_abandon() {
        for state in ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(validate_transition(state, BuildState::Abandoned).is_ok(), "{state}");
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = BuildOutcome::Abandoned {
            reason: AbandonReason::Cancelled,
            message: "build cancelled".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "abandoned");
        assert_eq!(json["reason"], "cancelled");
    }

    fn arb_state() -> impl Strategy<Value = BuildState> {
        prop_oneof![
            Just(BuildState::Editing),
            Just(BuildState::Validating),
            Just(BuildState::RetryStructured),
            Just(BuildState::RetryWholeFile),
            Just(BuildState::Applied),
            Just(BuildState::Abandoned),
        ]
    }

    proptest! {
        #[test]
        fn prop_retry_states_only_follow_validation(from in arb_state()) {
            for to in [BuildState::RetryStructured, BuildState::RetryWholeFile] {
                prop_assert_eq!(validate_transition(from, to).is_ok(), from == BuildState::Validating);
            }
        }
    }
}
