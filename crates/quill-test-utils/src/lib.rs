//! Testing utilities for Quill workspace
//!
//! Scripted collaborators and shared fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_llm::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionClient, DidSendModelRequest,
    HookError, ModelError, ModelHooks, WillSendModelRequest,
};
use quill_providers::{
    BaseModel, BaseModelUsesProvider, ModelProvider, ModelProviderConfig, ModelPublisher,
    ModelRole, ModelRoleConfig, ProviderRegistry,
};
use quill_syntax::{SyntaxCheck, SyntaxParser, SyntaxValidator};
use std::collections::VecDeque;
use std::time::Duration;

pub const VALID_RUST: &str = "pub fn answer() -> u32 {\n    42\n}\n";
pub const INVALID_RUST: &str = "pub fn answer() -> u32 {\n    42 +\n";

/// Completion client replaying scripted results in order
///
/// Once the script runs out every call fails with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    script: Mutex<VecDeque<Result<ChatCompletionResponse, ModelError>>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying(texts: &[&str]) -> Self {
        let client = Self::new();
        for text in texts {
            client.push_text(text);
        }
        client
    }

    pub fn push_text(&self, text: &str) {
        self.script
            .lock()
            .push_back(Ok(ChatCompletionResponse::text(text)));
    }

    pub fn push_err(&self, err: ModelError) {
        self.script.lock().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ModelError> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::transport("script exhausted")))
    }
}

/// Completion client that never answers
#[derive(Debug, Default)]
pub struct HangingCompletionClient;

#[async_trait]
impl CompletionClient for HangingCompletionClient {
    async fn create_chat_completion(
        &self,
        _request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ModelError> {
        std::future::pending().await
    }
}

/// Validator replaying scripted outcomes in order
///
/// A scripted `TimedOut` waits out the full timeout first. Once the script
/// runs out every check is `Valid`.
#[derive(Debug, Default)]
pub struct ScriptedValidator {
    script: Mutex<VecDeque<SyntaxCheck>>,
    checked: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub fn new(script: Vec<SyntaxCheck>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().clone()
    }
}

#[async_trait]
impl SyntaxValidator for ScriptedValidator {
    async fn check(&self, _parser: &SyntaxParser, content: &str, timeout: Duration) -> SyntaxCheck {
        self.checked.lock().push(content.to_string());
        let next = self.script.lock().pop_front().unwrap_or(SyntaxCheck::Valid);
        if next == SyntaxCheck::TimedOut {
            tokio::time::sleep(timeout).await;
        }
        next
    }
}

/// Hooks recording every call, optionally vetoing
#[derive(Debug, Default)]
pub struct RecordingHooks {
    veto: Option<String>,
    will_send: Mutex<Vec<WillSendModelRequest>>,
    did_send: Mutex<Vec<DidSendModelRequest>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vetoing(reason: &str) -> Self {
        Self {
            veto: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn will_send(&self) -> Vec<WillSendModelRequest> {
        self.will_send.lock().clone()
    }

    pub fn did_send(&self) -> Vec<DidSendModelRequest> {
        self.did_send.lock().clone()
    }
}

#[async_trait]
impl ModelHooks for RecordingHooks {
    async fn will_send_model_request(&self, params: &WillSendModelRequest) -> Result<(), HookError> {
        self.will_send.lock().push(params.clone());
        match &self.veto {
            Some(reason) => Err(HookError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn did_send_model_request(&self, params: &DidSendModelRequest) -> Result<(), HookError> {
        self.did_send.lock().push(params.clone());
        Ok(())
    }
}

/// Registry with two models served by three providers
///
/// `editor` is served by Anthropic then OpenRouter; `fixer` by OpenRouter
/// then OpenAI.
pub fn fixture_registry() -> ProviderRegistry {
    ProviderRegistry::new()
        .with_provider(ModelProviderConfig::new(ModelProvider::Anthropic, "https://anthropic.test"))
        .with_provider(ModelProviderConfig::new(ModelProvider::OpenRouter, "https://openrouter.test"))
        .with_provider(ModelProviderConfig::new(ModelProvider::OpenAI, "https://openai.test"))
        .with_model(
            BaseModel::new("editor", ModelPublisher::Anthropic, 100_000).with_output(8_000, 4_000),
            vec![
                BaseModelUsesProvider::new(ModelProvider::Anthropic, "editor-direct"),
                BaseModelUsesProvider::new(ModelProvider::OpenRouter, "vendor/editor"),
            ],
        )
        .with_model(
            BaseModel::new("fixer", ModelPublisher::OpenAI, 100_000).with_output(8_000, 4_000),
            vec![
                BaseModelUsesProvider::new(ModelProvider::OpenRouter, "vendor/fixer"),
                BaseModelUsesProvider::new(ModelProvider::OpenAI, "fixer-direct"),
            ],
        )
}

/// `editor` role with `fixer` as error fallback
pub fn fixture_role(role: ModelRole) -> ModelRoleConfig {
    ModelRoleConfig::new(role, "editor").with_error_fallback(ModelRoleConfig::new(role, "fixer"))
}
