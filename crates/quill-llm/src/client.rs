//! Completion client contract
//!
//! Transport and wire serialization live behind [`CompletionClient`].
//! [`create_chat_completion_with_retries`] is the low-level retry wrapper
//! every caller goes through; it only retries rate limits and transport
//! failures and is unrelated to the build retry state machine.

use crate::error::ModelError;
use crate::retry::{sleep_unless_cancelled, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempts made by the base retry wrapper
pub const BASE_RETRY_ATTEMPTS: u32 = 3;

/// Backoff base of the base retry wrapper
pub const BASE_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System preamble
    System,
    /// User turn
    User,
    /// Model turn
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: ChatRole,
    /// Text
    pub content: String,
}

impl ChatMessage {
    /// System message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Provider-specific model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Conversation
    pub messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// Create request with default sampling
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            top_p: 1.0,
            messages,
        }
    }

    /// With sampling parameters
    #[inline]
    #[must_use]
    pub fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub prompt_tokens: usize,
    /// Generated tokens
    pub completion_tokens: usize,
}

/// One generated alternative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Generated text
    pub content: String,
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Chat completion response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Generated alternatives
    pub choices: Vec<ChatChoice>,
    /// Usage, when the provider reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Single-choice response
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice {
                content: content.into(),
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        }
    }

    /// With usage
    #[inline]
    #[must_use]
    pub fn with_usage(mut self, prompt_tokens: usize, completion_tokens: usize) -> Self {
        self.usage = Some(Usage {
            prompt_tokens,
            completion_tokens,
        });
        self
    }

    /// Content of the first choice
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.content.as_str())
    }
}

/// Completion API collaborator
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one chat completion
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ModelError>;
}

/// Call `client` with the base retry policy
///
/// # Errors
/// The last error once [`BASE_RETRY_ATTEMPTS`] are spent, the first
/// non-retryable error, or `ModelError::Cancelled`.
pub async fn create_chat_completion_with_retries(
    client: &dyn CompletionClient,
    request: &ChatCompletionRequest,
    cancel: &CancellationToken,
) -> Result<ChatCompletionResponse, ModelError> {
    create_chat_completion_with_policy(
        client,
        request,
        BASE_RETRY_ATTEMPTS,
        RetryPolicy::new(BASE_RETRY_BACKOFF),
        cancel,
    )
    .await
}

/// Call `client`, retrying rate limits and transport failures
///
/// A provider `retry_after` hint replaces the policy delay.
///
/// # Errors
/// See [`create_chat_completion_with_retries`].
pub async fn create_chat_completion_with_policy(
    client: &dyn CompletionClient,
    request: &ChatCompletionRequest,
    max_attempts: u32,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ChatCompletionResponse, ModelError> {
    let mut attempt = 0u32;
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ModelError::Cancelled),
            result = client.create_chat_completion(request) => result,
        };

        let err = match result {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if !err.is_retryable() || !RetryPolicy::may_retry(attempt + 1, max_attempts) {
            return Err(err);
        }

        let delay = match &err {
            ModelError::RateLimited {
                retry_after: Some(hint),
            } => *hint,
            _ => policy.next_delay(attempt),
        };
        tracing::warn!(
            model = %request.model,
            attempt = attempt + 1,
            error = %err,
            "completion failed, retrying in {delay:?}"
        );

        if !sleep_unless_cancelled(delay, cancel).await {
            return Err(ModelError::Cancelled);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Script {
        results: Mutex<VecDeque<Result<ChatCompletionResponse, ModelError>>>,
        calls: Mutex<u32>,
    }

    impl Script {
        fn new(results: Vec<Result<ChatCompletionResponse, ModelError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl CompletionClient for Script {
        async fn create_chat_completion(
            &self,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, ModelError> {
            *self.calls.lock() += 1;
            self.results
                .lock()
                .pop_front()
                .unwrap_or(Err(ModelError::transport("script exhausted")))
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new("gpt", vec![ChatMessage::user("hi")])
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_then_succeeds() {
        let client = Script::new(vec![
            Err(ModelError::transport("reset")),
            Ok(ChatCompletionResponse::text("done")),
        ]);
        let response =
            create_chat_completion_with_retries(&client, &request(), &CancellationToken::new())
                .await
                .unwrap();
        assert_eq!(response.first_content(), Some("done"));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_base_attempts() {
        let client = Script::new(vec![]);
        let err = create_chat_completion_with_retries(&client, &request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)));
        assert_eq!(client.calls(), BASE_RETRY_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn status_errors_are_not_retried() {
        let client = Script::new(vec![Err(ModelError::Status {
            code: 400,
            message: "bad request".into(),
        })]);
        let err = create_chat_completion_with_retries(&client, &request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Status { code: 400, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn honors_retry_after_hint() {
        let client = Script::new(vec![
            Err(ModelError::RateLimited {
                retry_after: Some(Duration::from_secs(42)),
            }),
            Ok(ChatCompletionResponse::text("ok")),
        ]);
        let start = tokio::time::Instant::now();
        create_chat_completion_with_retries(&client, &request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(42));
    }

    #[tokio::test]
    async fn cancelled_before_call() {
        let client = Script::new(vec![Ok(ChatCompletionResponse::text("never"))]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = create_chat_completion_with_retries(&client, &request(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, ModelError::Cancelled);
    }
}
