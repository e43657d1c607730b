//! Per-file build orchestration
//!
//! One [`BuildOrchestrator::build_file`] run drives one file through
//! `Editing → Validating → {Applied | Retry* | Abandoned}`:
//!
//! 1. Detect the language and check the pre-build content once
//! 2. Request a candidate from the ranked providers of the current role
//! 3. Apply it and validate the result
//! 4. Escalate structured → whole-file on failure, within budget
//! 5. Persist the record and report progress
//!
//! Files of a build run concurrently through [`BuildOrchestrator::build_files`];
//! one file's failure never affects its siblings.

use crate::edit::apply_response;
use crate::error::BuildError;
use crate::file_state::{ActiveBuildStreamFileState, Escalation, FileBuildRequest};
use crate::prompt::build_messages;
use crate::record::{BuildRecord, BuildRecordStore, InMemoryBuildRecordStore};
use crate::state::{AbandonReason, BuildOutcome, BuildState, EditStrategy, Verification};
use crate::stream::ActiveBuildStreamState;
use quill_llm::{
    count_tokens, count_tokens_all, create_chat_completion_with_retries, sleep_unless_cancelled,
    ChatCompletionRequest, ChatCompletionResponse, CompletionClient, DidSendModelRequest,
    ModelError, ModelHooks, NoopHooks, RetryPolicy, WillSendModelRequest,
};
use quill_providers::{BuildConfig, ModelRoleConfig, ProviderComposite, ProviderRegistry, ProviderResolver};
use quill_syntax::{SyntaxCheck, SyntaxParser, SyntaxValidator, TreeSitterValidator};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Purpose reported to metering for build requests
pub const BUILD_PURPOSE: &str = "Built file edit";

/// Handle to a file build running on its own task
#[derive(Debug)]
pub struct FileBuildHandle {
    cancel: CancellationToken,
    join: JoinHandle<BuildRecord>,
}

impl FileBuildHandle {
    /// Cancel this file only
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the build record
    ///
    /// # Errors
    /// `JoinError` if the build task panicked.
    pub async fn join(self) -> Result<BuildRecord, JoinError> {
        self.join.await
    }
}

/// Drives file builds against shared collaborators
#[derive(Clone)]
pub struct BuildOrchestrator {
    registry: Arc<ProviderRegistry>,
    validator: Arc<dyn SyntaxValidator>,
    hooks: Arc<dyn ModelHooks>,
    records: Arc<dyn BuildRecordStore>,
}

impl BuildOrchestrator {
    /// Create orchestrator over the built-in registry
    #[must_use]
    pub fn new(
        validator: Arc<dyn SyntaxValidator>,
        hooks: Arc<dyn ModelHooks>,
        records: Arc<dyn BuildRecordStore>,
    ) -> Self {
        Self {
            registry: Arc::new(ProviderRegistry::builtin().clone()),
            validator,
            hooks,
            records,
        }
    }

    /// With a specific registry
    #[inline]
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registry used for resolution
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build one file under a child of the stream's cancellation token
    pub async fn build_file(
        &self,
        stream: &Arc<ActiveBuildStreamState>,
        request: FileBuildRequest,
    ) -> BuildRecord {
        let cancel = stream.cancellation().child_token();
        self.run(Arc::clone(stream), request, cancel).await
    }

    /// Build one file on its own task
    #[must_use]
    pub fn spawn_file(
        &self,
        stream: &Arc<ActiveBuildStreamState>,
        request: FileBuildRequest,
    ) -> FileBuildHandle {
        let cancel = stream.cancellation().child_token();
        let this = self.clone();
        let stream = Arc::clone(stream);
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move { this.run_guarded(stream, request, task_cancel).await });
        FileBuildHandle { cancel, join }
    }

    /// Build files concurrently, returning records in request order
    ///
    /// A file whose build panics is abandoned with [`AbandonReason::Internal`].
    pub async fn build_files(
        &self,
        stream: &Arc<ActiveBuildStreamState>,
        requests: Vec<FileBuildRequest>,
    ) -> Vec<BuildRecord> {
        let mut tasks = JoinSet::new();
        let total = requests.len();
        for (index, request) in requests.into_iter().enumerate() {
            let this = self.clone();
            let stream = Arc::clone(stream);
            let cancel = stream.cancellation().child_token();
            tasks.spawn(async move { (index, this.run_guarded(stream, request, cancel).await) });
        }

        let mut slots: Vec<Option<BuildRecord>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => slots[index] = Some(record),
                Err(err) => tracing::error!(error = %err, "file build task failed"),
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// Run on a task of its own so a panic still yields a record
    async fn run_guarded(
        &self,
        stream: Arc<ActiveBuildStreamState>,
        request: FileBuildRequest,
        cancel: CancellationToken,
    ) -> BuildRecord {
        let this = self.clone();
        let task_stream = Arc::clone(&stream);
        let task_request = request.clone();
        let task_cancel = cancel.clone();
        let joined =
            tokio::spawn(async move { this.run(task_stream, task_request, task_cancel).await })
                .await;

        match joined {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(path = %request.path, error = %err, "file build panicked");
                let mut file = ActiveBuildStreamFileState::new(stream, request, None, cancel);
                if let Err(fault) = file.transition(BuildState::Abandoned) {
                    tracing::error!(path = %file.path, error = %fault, "cannot abandon build");
                }
                let outcome = BuildOutcome::Abandoned {
                    reason: AbandonReason::Internal,
                    message: format!("file build panicked: {err}"),
                };
                self.finish(&file, outcome).await
            }
        }
    }

    async fn run(
        &self,
        stream: Arc<ActiveBuildStreamState>,
        request: FileBuildRequest,
        cancel: CancellationToken,
    ) -> BuildRecord {
        stream.file_started();
        let parser = parser_for(&request.path);
        let mut file = ActiveBuildStreamFileState::new(stream, request, parser, cancel);
        let span = tracing::info_span!(
            "build_file",
            plan_id = %file.stream.plan_id,
            path = %file.path,
            build_id = %file.build_id,
        );

        let outcome = match self.drive(&mut file).instrument(span).await {
            Ok((content, verification)) => BuildOutcome::Applied {
                content,
                verification,
            },
            Err(err) => {
                if let Err(fault) = file.transition(BuildState::Abandoned) {
                    tracing::error!(path = %file.path, error = %fault, "cannot abandon build");
                }
                BuildOutcome::Abandoned {
                    reason: err.abandon_reason(),
                    message: err.to_string(),
                }
            }
        };

        self.finish(&file, outcome).await
    }

    async fn finish(&self, file: &ActiveBuildStreamFileState, outcome: BuildOutcome) -> BuildRecord {
        let record = BuildRecord::from_file_state(file, outcome);
        if let Err(err) = self.records.upsert_build_record(&record).await {
            tracing::error!(path = %file.path, build_id = %file.build_id, error = %err, "failed to persist build record");
        }

        let state = record.state();
        let reason = record.outcome.abandon_reason();
        file.stream.finished(&file.path, state, reason);

        tracing::info!(
            plan_id = %file.stream.plan_id,
            path = %file.path,
            %state,
            ?reason,
            attempts = file.attempts,
            structured_retries = file.structured_edit_num_retry,
            whole_file_retries = file.whole_file_num_retry,
            "file build finished"
        );
        record
    }

    async fn drive(
        &self,
        file: &mut ActiveBuildStreamFileState,
    ) -> Result<(String, Verification), BuildError> {
        let config = file.stream.settings.build;
        let policy = RetryPolicy::new(config.retry_base_delay());
        let timeout = config.syntax_check_timeout();

        let pre_check = file
            .parser
            .clone()
            .zip(file.pre_build_content().map(str::to_string));
        if let Some((parser, content)) = pre_check {
            match self.check(&parser, &content, timeout, file.cancellation()).await? {
                SyntaxCheck::Valid => {}
                SyntaxCheck::Invalid(issues) => {
                    tracing::debug!(path = %file.path, issues = issues.len(), "pre-build content is invalid");
                    file.pre_build_state_syntax_invalid = true;
                }
                SyntaxCheck::TimedOut => {
                    tracing::warn!(path = %file.path, "pre-build syntax check timed out, assuming valid");
                }
            }
        }

        loop {
            let response = self.request_candidate(file, &config, policy).await?;
            let candidate = apply_response(file.strategy, file.pre_build_content(), &response);

            file.attempts += 1;
            file.transition(BuildState::Validating)?;
            file.stream.attempt(&file.path, file.attempts, file.strategy);

            let feedback = match candidate {
                Err(err) => {
                    tracing::debug!(path = %file.path, error = %err, "candidate edit rejected");
                    format!("The edit could not be applied: {err}")
                }
                Ok(content) => {
                    let Some(parser) = file.parser.clone() else {
                        file.transition(BuildState::Applied)?;
                        return Ok((content, Verification::Unsupported));
                    };
                    let check = self.check(&parser, &content, timeout, file.cancellation()).await?;
                    if check == SyntaxCheck::TimedOut {
                        file.syntax_check_timed_out = true;
                    }
                    if check.is_valid() {
                        file.transition(BuildState::Applied)?;
                        return Ok((content, Verification::Verified));
                    }
                    if file.pre_build_state_syntax_invalid {
                        file.transition(BuildState::Applied)?;
                        return Ok((content, Verification::PreExistingInvalid));
                    }
                    check.feedback().unwrap_or_default()
                }
            };

            let delay = match file.escalate(feedback, &config, policy) {
                Escalation::Structured { delay } => {
                    file.transition(BuildState::RetryStructured)?;
                    delay
                }
                Escalation::WholeFile { delay, epoch_start } => {
                    file.transition(BuildState::RetryWholeFile)?;
                    if epoch_start {
                        tracing::debug!(path = %file.path, retry = file.whole_file_num_retry, "starting whole-file epoch");
                    }
                    delay
                }
                Escalation::Exhausted => {
                    return Err(BuildError::RetryBudgetExhausted {
                        structured: file.structured_edit_num_retry,
                        whole_file: file.whole_file_num_retry,
                    })
                }
            };

            tracing::warn!(
                path = %file.path,
                strategy = %file.strategy,
                structured_retries = file.structured_edit_num_retry,
                whole_file_retries = file.whole_file_num_retry,
                "build attempt failed, retrying in {delay:?}"
            );
            if !sleep_unless_cancelled(delay, file.cancellation()).await {
                return Err(BuildError::Cancelled);
            }
            file.transition(BuildState::Editing)?;
        }
    }

    async fn check(
        &self,
        parser: &SyntaxParser,
        content: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<SyntaxCheck, BuildError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(BuildError::Cancelled),
            check = self.validator.check(parser, content, timeout) => Ok(check),
        }
    }

    /// Request one candidate, rotating providers on model failures
    async fn request_candidate(
        &self,
        file: &ActiveBuildStreamFileState,
        config: &BuildConfig,
        policy: RetryPolicy,
    ) -> Result<String, BuildError> {
        let stream = &file.stream;
        let pack = &stream.settings.model_pack;
        let base_role = match file.strategy {
            EditStrategy::Structured => &pack.builder,
            EditStrategy::WholeFile => pack.whole_file_builder(),
        };

        let messages = build_messages(file);
        let input_tokens = count_tokens_all(messages.iter().map(|m| m.content.as_str()));
        let role = base_role.role_for_input_tokens(input_tokens, &self.registry);

        let resolver = ProviderResolver::new(&self.registry);
        let options = resolver.resolve(role, Some(&stream.settings));
        let ranked: Vec<(ProviderComposite, Arc<dyn CompletionClient>)> = options
            .ranked()
            .into_iter()
            .filter_map(|(composite, _)| {
                stream
                    .client(composite)
                    .map(|client| (composite.clone(), Arc::clone(client)))
            })
            .collect();
        if ranked.is_empty() {
            return Err(BuildError::NoProviderAvailable {
                role: role.role,
                model_id: role.model_id.clone(),
            });
        }

        let output_tokens = role.reserved_output_tokens(&self.registry);
        let cancel = file.cancellation();
        let mut attempt = 0u32;
        loop {
            let (provider, client) = &ranked[attempt as usize % ranked.len()];
            let model_name = resolver.model_name(&role.model_id, provider, Some(&stream.settings));

            let will_send = WillSendModelRequest {
                auth: stream.auth.clone(),
                plan_id: stream.plan_id.clone(),
                input_tokens,
                output_tokens,
                model_name: model_name.clone(),
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(BuildError::Cancelled),
                verdict = self.hooks.will_send_model_request(&will_send) => {
                    verdict.map_err(BuildError::MeteringRejected)?;
                }
            }

            tracing::debug!(path = %file.path, %provider, model = %model_name, attempt, "requesting candidate");
            let request = ChatCompletionRequest::new(model_name.clone(), messages.clone())
                .with_sampling(role.temperature, role.top_p);

            let err = match create_chat_completion_with_retries(client.as_ref(), &request, cancel).await {
                Ok(response) => match response.first_content() {
                    Some(content) => {
                        let content = content.to_string();
                        self.account(file, role, provider, model_name, input_tokens, &response, &content)
                            .await;
                        return Ok(content);
                    }
                    None => ModelError::EmptyResponse,
                },
                Err(ModelError::Cancelled) => return Err(BuildError::Cancelled),
                Err(err) => err,
            };

            attempt += 1;
            if !RetryPolicy::may_retry(attempt, config.max_build_error_retries) {
                return Err(BuildError::TransportExhausted {
                    attempts: attempt,
                    source: err,
                });
            }
            let delay = policy.next_delay(attempt - 1);
            tracing::warn!(
                path = %file.path,
                %provider,
                attempt,
                error = %err,
                "model request failed, retrying in {delay:?}"
            );
            if !sleep_unless_cancelled(delay, cancel).await {
                return Err(BuildError::Cancelled);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn account(
        &self,
        file: &ActiveBuildStreamFileState,
        role: &ModelRoleConfig,
        provider: &ProviderComposite,
        model_name: String,
        estimated_input_tokens: usize,
        response: &ChatCompletionResponse,
        content: &str,
    ) {
        let (input_tokens, output_tokens) = match response.usage {
            Some(usage) if usage.completion_tokens > 0 => (usage.prompt_tokens, usage.completion_tokens),
            _ => (estimated_input_tokens, count_tokens(content)),
        };
        let stream = &file.stream;
        let params = DidSendModelRequest {
            auth: stream.auth.clone(),
            plan_id: stream.plan_id.clone(),
            input_tokens,
            output_tokens,
            model_name,
            provider: provider.clone(),
            model_pack: stream.settings.model_pack.name.clone(),
            role: role.role,
            purpose: BUILD_PURPOSE.to_string(),
        };
        if let Err(err) = self.hooks.did_send_model_request(&params).await {
            tracing::warn!(path = %file.path, error = %err, "build accounting failed");
        }
    }
}

impl Default for BuildOrchestrator {
    fn default() -> Self {
        Self::new(
            Arc::new(TreeSitterValidator::new()),
            Arc::new(NoopHooks),
            Arc::new(InMemoryBuildRecordStore::new()),
        )
    }
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("models", &self.registry.model_count())
            .finish_non_exhaustive()
    }
}

fn parser_for(path: &str) -> Option<SyntaxParser> {
    match SyntaxParser::for_path(path) {
        Ok(parser) => parser,
        Err(err) => {
            tracing::warn!(path, error = %err, "grammar unavailable, skipping syntax checks");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_detection() {
        assert!(parser_for("src/lib.rs").is_some());
        assert!(parser_for("README.md").is_none());
    }

    #[test]
    fn default_uses_builtin_registry() {
        let orchestrator = BuildOrchestrator::default();
        assert!(orchestrator.registry().model_count() > 0);
    }
}
