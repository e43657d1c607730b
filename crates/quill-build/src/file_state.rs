//! Per-file build state
//!
//! [`ActiveBuildStreamFileState`] is owned by the task building one file
//! and holds the shared stream context by `Arc`. Retry counters are only
//! ever advanced through [`ActiveBuildStreamFileState::escalate`], which
//! checks the budget before incrementing.

use crate::error::StateMachineError;
use crate::state::{validate_transition, BuildState, EditStrategy};
use crate::stream::ActiveBuildStreamState;
use quill_llm::RetryPolicy;
use quill_providers::BuildConfig;
use quill_syntax::SyntaxParser;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Plan revision a build was started against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    /// Monotonic plan revision
    pub revision: u64,
    /// Current plan description
    pub description: String,
}

/// Request to build one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBuildRequest {
    /// Path relative to the project root
    pub path: String,
    /// Conversation message that produced the edit
    pub convo_message_id: String,
    /// What the edit should do
    pub edit_description: String,
    /// Content before the edit; `None` for a new file
    pub pre_build_state: Option<String>,
    /// Plan revision
    pub plan_snapshot: PlanSnapshot,
}

impl FileBuildRequest {
    /// Edit an existing file
    #[must_use]
    pub fn edit(
        path: impl Into<String>,
        convo_message_id: impl Into<String>,
        edit_description: impl Into<String>,
        pre_build_state: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            convo_message_id: convo_message_id.into(),
            edit_description: edit_description.into(),
            pre_build_state: Some(pre_build_state.into()),
            plan_snapshot: PlanSnapshot::default(),
        }
    }

    /// Create a new file
    #[must_use]
    pub fn create(
        path: impl Into<String>,
        convo_message_id: impl Into<String>,
        edit_description: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            convo_message_id: convo_message_id.into(),
            edit_description: edit_description.into(),
            pre_build_state: None,
            plan_snapshot: PlanSnapshot::default(),
        }
    }

    /// With plan snapshot
    #[inline]
    #[must_use]
    pub fn with_plan_snapshot(mut self, snapshot: PlanSnapshot) -> Self {
        self.plan_snapshot = snapshot;
        self
    }
}

/// Next step after a failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Retry with a structured edit after `delay`
    Structured {
        /// Backoff before the next attempt
        delay: std::time::Duration,
    },
    /// Retry with a whole-file rewrite after `delay`
    WholeFile {
        /// Backoff before the next attempt
        delay: std::time::Duration,
        /// First attempt of an epoch
        epoch_start: bool,
    },
    /// Both budgets spent
    Exhausted,
}

/// Mutable state of one file's build
#[derive(Debug)]
pub struct ActiveBuildStreamFileState {
    /// Shared stream context
    pub stream: Arc<ActiveBuildStreamState>,
    /// File path
    pub path: String,
    /// Conversation message that produced the edit
    pub convo_message_id: String,
    /// Unique id of this build
    pub build_id: Ulid,
    /// Plan revision
    pub plan_snapshot: PlanSnapshot,
    /// What the edit should do
    pub edit_description: String,
    /// Content before the edit; empty for a new file
    pub pre_build_state: String,
    /// Parser bound to the file's language
    pub parser: Option<SyntaxParser>,
    /// A post-edit syntax check timed out
    pub syntax_check_timed_out: bool,
    /// Content was invalid before the edit
    pub pre_build_state_syntax_invalid: bool,
    /// Structured retries used
    pub structured_edit_num_retry: u32,
    /// Whole-file retries used
    pub whole_file_num_retry: u32,
    /// File does not exist yet
    pub is_new_file: bool,
    /// Strategy of the next attempt
    pub strategy: EditStrategy,
    /// Validator and edit feedback for the next attempt
    pub feedback: Vec<String>,
    /// Candidate edits produced
    pub attempts: u32,
    state: BuildState,
    history: Vec<BuildState>,
    cancel: CancellationToken,
}

impl ActiveBuildStreamFileState {
    /// Create file state in [`BuildState::INITIAL`]
    ///
    /// `cancel` should be a child of the stream token.
    #[must_use]
    pub fn new(
        stream: Arc<ActiveBuildStreamState>,
        request: FileBuildRequest,
        parser: Option<SyntaxParser>,
        cancel: CancellationToken,
    ) -> Self {
        let is_new_file = request.pre_build_state.is_none();
        Self {
            stream,
            path: request.path,
            convo_message_id: request.convo_message_id,
            build_id: Ulid::new(),
            plan_snapshot: request.plan_snapshot,
            edit_description: request.edit_description,
            pre_build_state: request.pre_build_state.unwrap_or_default(),
            parser,
            syntax_check_timed_out: false,
            pre_build_state_syntax_invalid: false,
            structured_edit_num_retry: 0,
            whole_file_num_retry: 0,
            is_new_file,
            strategy: EditStrategy::default(),
            feedback: Vec::new(),
            attempts: 0,
            state: BuildState::INITIAL,
            history: vec![BuildState::INITIAL],
            cancel,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Every state entered, starting with the initial one
    #[must_use]
    pub fn history(&self) -> &[BuildState] {
        &self.history
    }

    /// Cancellation token of this file
    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Pre-build content, `None` for a new file
    #[must_use]
    pub fn pre_build_content(&self) -> Option<&str> {
        (!self.is_new_file).then_some(self.pre_build_state.as_str())
    }

    /// Move to `to`
    ///
    /// # Errors
    /// `StateMachineError::IllegalTransition` if `to` is not reachable.
    pub fn transition(&mut self, to: BuildState) -> Result<(), StateMachineError> {
        validate_transition(self.state, to)?;
        tracing::debug!(path = %self.path, from = %self.state, %to, "build transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Pick the next retry after a failed validation
    ///
    /// Structured retries come first, then whole-file retries grouped in
    /// epochs of `fix_syntax_retries`. The first attempt of an epoch
    /// replaces the accumulated feedback with `feedback`; every other retry
    /// appends it. Counters never pass their budgets.
    pub fn escalate(
        &mut self,
        feedback: String,
        config: &BuildConfig,
        policy: RetryPolicy,
    ) -> Escalation {
        if RetryPolicy::may_retry(self.structured_edit_num_retry, config.max_build_error_retries) {
            let delay = policy.next_delay(self.structured_edit_num_retry);
            self.structured_edit_num_retry += 1;
            self.strategy = EditStrategy::Structured;
            self.feedback.push(feedback);
            return Escalation::Structured { delay };
        }

        if RetryPolicy::may_retry(self.whole_file_num_retry, config.max_whole_file_retries()) {
            let index_in_epoch = self.whole_file_num_retry % config.fix_syntax_retries.max(1);
            self.whole_file_num_retry += 1;
            self.strategy = EditStrategy::WholeFile;
            let epoch_start = index_in_epoch == 0;
            if epoch_start {
                self.feedback.clear();
            }
            self.feedback.push(feedback);
            return Escalation::WholeFile {
                delay: policy.next_delay(index_in_epoch),
                epoch_start,
            };
        }

        Escalation::Exhausted
    }
}
