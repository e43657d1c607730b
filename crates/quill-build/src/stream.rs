//! Shared state of one plan build stream
//!
//! [`ActiveBuildStreamState`] is created once per plan build, finished with
//! its builder methods and then shared read-only as
//! `Arc<ActiveBuildStreamState>` by every file task. The only mutable
//! surface is the aggregate [`BuildProgress`] (under a mutex) and the
//! [`BuildEvent`] channel.

use crate::state::{AbandonReason, BuildState, EditStrategy};
use parking_lot::Mutex;
use quill_llm::{CompletionClient, ConvoMessage, TenantAuth};
use quill_providers::{PlanSettings, ProviderComposite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// File loaded into the model context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    /// Path relative to the project root
    pub path: String,
    /// File body
    pub body: String,
}

impl ContextFile {
    /// Create context file
    #[must_use]
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
        }
    }
}

/// Progress event streamed to the plan's listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
    /// A candidate was produced and is going to validation
    Attempt {
        /// File path
        path: String,
        /// 1-based attempt number for this file
        attempt: u32,
        /// Strategy of the attempt
        strategy: EditStrategy,
    },
    /// A file reached a terminal state
    Finished {
        /// File path
        path: String,
        /// `Applied` or `Abandoned`
        state: BuildState,
        /// Sub-reason when abandoned
        reason: Option<AbandonReason>,
    },
}

/// Aggregate counts across the files of a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProgress {
    /// Files whose build started
    pub files_started: usize,
    /// Files applied
    pub applied: usize,
    /// Files abandoned
    pub abandoned: usize,
    /// Candidate edits produced across all files
    pub attempts: usize,
}

impl BuildProgress {
    /// Files still running
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.files_started
            .saturating_sub(self.applied + self.abandoned)
    }
}

/// Shared, read-only context of a plan build
pub struct ActiveBuildStreamState {
    /// Billed tenant
    pub auth: TenantAuth,
    /// Plan being built
    pub plan_id: String,
    /// Plan branch
    pub branch: String,
    /// Model pack, custom providers and build policy
    pub settings: PlanSettings,
    /// Conversation so far
    pub convo: Vec<ConvoMessage>,
    /// Files loaded into context
    pub model_context: Vec<ContextFile>,
    clients: HashMap<ProviderComposite, Arc<dyn CompletionClient>>,
    cancel: CancellationToken,
    progress: Mutex<BuildProgress>,
    events: mpsc::UnboundedSender<BuildEvent>,
}

impl ActiveBuildStreamState {
    /// Create stream state and the receiving end of its event channel
    #[must_use]
    pub fn new(
        auth: TenantAuth,
        plan_id: impl Into<String>,
        branch: impl Into<String>,
        settings: PlanSettings,
    ) -> (Self, mpsc::UnboundedReceiver<BuildEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let state = Self {
            auth,
            plan_id: plan_id.into(),
            branch: branch.into(),
            settings,
            convo: Vec::new(),
            model_context: Vec::new(),
            clients: HashMap::new(),
            cancel: CancellationToken::new(),
            progress: Mutex::new(BuildProgress::default()),
            events,
        };
        (state, rx)
    }

    /// With conversation
    #[must_use]
    pub fn with_convo(mut self, convo: Vec<ConvoMessage>) -> Self {
        self.convo = convo;
        self
    }

    /// With a file in the model context
    #[must_use]
    pub fn with_context_file(mut self, file: ContextFile) -> Self {
        self.model_context.push(file);
        self
    }

    /// With the client serving `provider`
    #[must_use]
    pub fn with_client(
        mut self,
        provider: ProviderComposite,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        self.clients.insert(provider, client);
        self
    }

    /// With an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Client for `provider`, if one is active
    #[must_use]
    pub fn client(&self, provider: &ProviderComposite) -> Option<&Arc<dyn CompletionClient>> {
        self.clients.get(provider)
    }

    /// Stream-wide cancellation token
    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every file of the stream
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Snapshot of aggregate progress
    #[must_use]
    pub fn progress(&self) -> BuildProgress {
        *self.progress.lock()
    }

    pub(crate) fn file_started(&self) {
        self.progress.lock().files_started += 1;
    }

    pub(crate) fn attempt(&self, path: &str, attempt: u32, strategy: EditStrategy) {
        self.progress.lock().attempts += 1;
        self.emit(BuildEvent::Attempt {
            path: path.to_string(),
            attempt,
            strategy,
        });
    }

    pub(crate) fn finished(&self, path: &str, state: BuildState, reason: Option<AbandonReason>) {
        {
            let mut progress = self.progress.lock();
            match state {
                BuildState::Applied => progress.applied += 1,
                _ => progress.abandoned += 1,
            }
        }
        self.emit(BuildEvent::Finished {
            path: path.to_string(),
            state,
            reason,
        });
    }

    fn emit(&self, event: BuildEvent) {
        // Listeners may go away before the build finishes.
        if self.events.send(event).is_err() {
            tracing::trace!(plan_id = %self.plan_id, "build event receiver dropped");
        }
    }
}

impl fmt::Debug for ActiveBuildStreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveBuildStreamState")
            .field("auth", &self.auth)
            .field("plan_id", &self.plan_id)
            .field("branch", &self.branch)
            .field("convo", &self.convo.len())
            .field("model_context", &self.model_context.len())
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_providers::ModelProvider;

    fn stream() -> (ActiveBuildStreamState, mpsc::UnboundedReceiver<BuildEvent>) {
        ActiveBuildStreamState::new(
            TenantAuth::new("org", "user"),
            "plan",
            "main",
            PlanSettings::default(),
        )
    }

    #[test]
    fn progress_counts_terminal_states() {
        let (state, mut rx) = stream();
        state.file_started();
        state.file_started();
        state.attempt("a.rs", 1, EditStrategy::Structured);
        state.finished("a.rs", BuildState::Applied, None);
        assert_eq!(state.progress().in_flight(), 1);

        state.finished("b.rs", BuildState::Abandoned, Some(AbandonReason::Cancelled));
        let progress = state.progress();
        assert_eq!(progress.applied, 1);
        assert_eq!(progress.abandoned, 1);
        assert_eq!(progress.attempts, 1);
        assert_eq!(progress.in_flight(), 0);

        assert!(matches!(rx.try_recv(), Ok(BuildEvent::Attempt { attempt: 1, .. })));
        assert!(matches!(
            rx.try_recv(),
            Ok(BuildEvent::Finished {
                state: BuildState::Applied,
                ..
            })
        ));
    }

    #[test]
    fn events_survive_dropped_receiver() {
        let (state, rx) = stream();
        drop(rx);
        state.attempt("a.rs", 1, EditStrategy::WholeFile);
        assert_eq!(state.progress().attempts, 1);
    }

    #[test]
    fn client_lookup_by_composite() {
        let (state, _rx) = stream();
        assert!(state
            .client(&ProviderComposite::builtin(ModelProvider::OpenAI))
            .is_none());
    }

    #[test]
    fn event_serialization() {
        let event = BuildEvent::Attempt {
            path: "src/lib.rs".into(),
            attempt: 2,
            strategy: EditStrategy::WholeFile,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "attempt");
        assert_eq!(json["strategy"], "whole_file");
    }
}
