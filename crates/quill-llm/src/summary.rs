//! Plan summarization
//!
//! Condenses a plan conversation into a summary with one completion call.
//! Summaries carry a watermark (latest covered message id and timestamp) so
//! later runs resume strictly after it.

use crate::client::{create_chat_completion_with_retries, ChatCompletionRequest, ChatMessage, CompletionClient};
use crate::convo::{messages_after_watermark, ConvoMessage, ConvoSummary};
use crate::error::{ModelError, SummaryError};
use crate::hooks::{DidSendModelRequest, ModelHooks, TenantAuth, WillSendModelRequest};
use crate::tokens::count_tokens;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quill_providers::{ModelRole, ModelRoleConfig, ProviderComposite, ProviderRegistry, ProviderResolver};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// System preamble of every summary request
pub const IDENTITY_PROMPT: &str = "You are Quill, an AI programming assistant that plans and \
writes code changes across a project in collaboration with the user.";

/// Final instruction of every summary request
pub const PLAN_SUMMARY_PROMPT: &str = "Summarize the conversation so far. Keep every decision, \
requirement and constraint the user stated, the current state of the plan, and the files \
involved. Leave out pleasantries and anything superseded later in the conversation.";

/// Prefix of stored summaries
pub const SUMMARY_HEADER: &str = "## Summary of the plan so far:\n\n";

/// Purpose reported to metering
pub const SUMMARY_PURPOSE: &str = "Generated plan summary";

/// Inputs of one summarization
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSummaryParams {
    /// Billed tenant
    pub auth: TenantAuth,
    /// Plan
    pub plan_id: String,
    /// Model pack name reported to metering
    pub model_pack_name: String,
    /// Messages to summarize
    pub conversation: Vec<ChatMessage>,
    /// Token count of `conversation`
    pub conversation_num_tokens: usize,
    /// Last message covered
    pub latest_convo_message_id: String,
    /// Timestamp of the last message covered
    pub latest_convo_message_created_at: DateTime<Utc>,
    /// Messages folded into the summary, including earlier summaries
    pub num_messages: usize,
    /// Watermark of the summary being extended
    pub previous_watermark: Option<DateTime<Utc>>,
}

impl PlanSummaryParams {
    /// Params covering messages after `previous`
    ///
    /// The previous summary text leads the conversation so the new summary
    /// subsumes it. Returns `None` when nothing new was said.
    #[must_use]
    pub fn from_convo(
        auth: TenantAuth,
        plan_id: impl Into<String>,
        model_pack_name: impl Into<String>,
        convo: &[ConvoMessage],
        previous: Option<&ConvoSummary>,
    ) -> Option<Self> {
        let fresh = messages_after_watermark(convo, previous);
        let latest = fresh.last()?;

        let mut conversation = Vec::with_capacity(fresh.len() + 1);
        let mut num_tokens = 0;
        if let Some(previous) = previous {
            conversation.push(ChatMessage::assistant(previous.summary.clone()));
            num_tokens += previous.tokens.max(count_tokens(&previous.summary));
        }
        for message in fresh {
            conversation.push(message.to_chat_message());
            num_tokens += message.num_tokens;
        }

        Some(Self {
            auth,
            plan_id: plan_id.into(),
            model_pack_name: model_pack_name.into(),
            conversation,
            conversation_num_tokens: num_tokens,
            latest_convo_message_id: latest.id.clone(),
            latest_convo_message_created_at: latest.created_at,
            num_messages: previous.map_or(0, |p| p.num_messages) + fresh.len(),
            previous_watermark: previous.map(|p| p.latest_convo_message_created_at),
        })
    }
}

/// Persistence of conversation summaries
#[async_trait]
pub trait ConvoSummaryStore: Send + Sync {
    /// Insert or replace the summary for its plan
    async fn upsert_convo_summary(&self, summary: &ConvoSummary) -> Result<(), SummaryError>;

    /// Latest summary of a plan
    async fn latest_convo_summary(&self, plan_id: &str) -> Result<Option<ConvoSummary>, SummaryError>;
}

/// Summary store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryConvoSummaryStore {
    summaries: DashMap<String, ConvoSummary>,
}

impl InMemoryConvoSummaryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConvoSummaryStore for InMemoryConvoSummaryStore {
    async fn upsert_convo_summary(&self, summary: &ConvoSummary) -> Result<(), SummaryError> {
        self.summaries.insert(summary.plan_id.clone(), summary.clone());
        Ok(())
    }

    async fn latest_convo_summary(&self, plan_id: &str) -> Result<Option<ConvoSummary>, SummaryError> {
        Ok(self.summaries.get(plan_id).map(|entry| entry.clone()))
    }
}

/// Summarizes plan conversations through one provider
pub struct PlanSummarizer<'a> {
    client: Arc<dyn CompletionClient>,
    provider: ProviderComposite,
    hooks: Arc<dyn ModelHooks>,
    registry: &'a ProviderRegistry,
}

impl PlanSummarizer<'static> {
    /// Create summarizer over the built-in registry
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        provider: ProviderComposite,
        hooks: Arc<dyn ModelHooks>,
    ) -> Self {
        Self {
            client,
            provider,
            hooks,
            registry: ProviderRegistry::builtin(),
        }
    }
}

impl<'a> PlanSummarizer<'a> {
    /// With a specific registry
    #[must_use]
    pub fn with_registry<'b>(self, registry: &'b ProviderRegistry) -> PlanSummarizer<'b> {
        PlanSummarizer {
            client: self.client,
            provider: self.provider,
            hooks: self.hooks,
            registry,
        }
    }

    /// Summarize `params.conversation`
    ///
    /// # Errors
    /// - `SummaryError::StaleWatermark` if the params end before the
    ///   previous summary's watermark
    /// - `SummaryError::Metering` if either hook rejects; nothing is produced
    /// - `SummaryError::Model` on completion failure or an empty response
    pub async fn summarize(
        &self,
        config: &ModelRoleConfig,
        params: &PlanSummaryParams,
        cancel: &CancellationToken,
    ) -> Result<ConvoSummary, SummaryError> {
        if let Some(previous) = params.previous_watermark {
            if params.latest_convo_message_created_at < previous {
                return Err(SummaryError::StaleWatermark {
                    latest: params.latest_convo_message_created_at,
                    previous,
                });
            }
        }

        let mut messages = Vec::with_capacity(params.conversation.len() + 2);
        messages.push(ChatMessage::system(IDENTITY_PROMPT));
        messages.extend(params.conversation.iter().cloned());
        messages.push(ChatMessage::user(PLAN_SUMMARY_PROMPT));

        let num_tokens = params.conversation_num_tokens
            + count_tokens(IDENTITY_PROMPT)
            + count_tokens(PLAN_SUMMARY_PROMPT);

        let model_name = ProviderResolver::new(self.registry).model_name(&config.model_id, &self.provider, None);

        self.hooks
            .will_send_model_request(&WillSendModelRequest {
                auth: params.auth.clone(),
                plan_id: params.plan_id.clone(),
                input_tokens: num_tokens,
                output_tokens: config.reserved_output_tokens(self.registry),
                model_name: model_name.clone(),
            })
            .await?;

        tracing::debug!(
            plan_id = %params.plan_id,
            model = %model_name,
            messages = params.conversation.len(),
            "summarizing conversation"
        );

        let request = ChatCompletionRequest::new(model_name.clone(), messages)
            .with_sampling(config.temperature, config.top_p);
        let response = create_chat_completion_with_retries(self.client.as_ref(), &request, cancel)
            .await
            .map_err(|e| {
                tracing::warn!(plan_id = %params.plan_id, error = %e, "plan summary failed");
                e
            })?;

        let content = response
            .first_content()
            .ok_or(ModelError::EmptyResponse)?
            .to_string();

        let (input_tokens, output_tokens) = match response.usage {
            Some(usage) if usage.completion_tokens > 0 => (usage.prompt_tokens, usage.completion_tokens),
            _ => (num_tokens, count_tokens(&content)),
        };

        self.hooks
            .did_send_model_request(&DidSendModelRequest {
                auth: params.auth.clone(),
                plan_id: params.plan_id.clone(),
                input_tokens,
                output_tokens,
                model_name,
                provider: self.provider.clone(),
                model_pack: params.model_pack_name.clone(),
                role: ModelRole::PlanSummary,
                purpose: SUMMARY_PURPOSE.to_string(),
            })
            .await?;

        Ok(ConvoSummary {
            org_id: params.auth.org_id.clone(),
            plan_id: params.plan_id.clone(),
            summary: format!("{SUMMARY_HEADER}{content}"),
            tokens: output_tokens,
            latest_convo_message_id: params.latest_convo_message_id.clone(),
            latest_convo_message_created_at: params.latest_convo_message_created_at,
            num_messages: params.num_messages,
        })
    }

    /// Summarize and persist
    ///
    /// # Errors
    /// As [`Self::summarize`], plus store failures.
    pub async fn summarize_into(
        &self,
        config: &ModelRoleConfig,
        params: &PlanSummaryParams,
        store: &dyn ConvoSummaryStore,
        cancel: &CancellationToken,
    ) -> Result<ConvoSummary, SummaryError> {
        let summary = self.summarize(config, params, cancel).await?;
        store.upsert_convo_summary(&summary).await?;
        tracing::info!(
            plan_id = %summary.plan_id,
            num_messages = summary.num_messages,
            tokens = summary.tokens,
            "stored plan summary"
        );
        Ok(summary)
    }
}
