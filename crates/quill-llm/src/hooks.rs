//! Metering hooks around model calls

use crate::error::HookError;
use async_trait::async_trait;
use quill_providers::{ModelRole, ProviderComposite};
use serde::{Deserialize, Serialize};

/// Tenant identity a request is billed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantAuth {
    /// Organization
    pub org_id: String,
    /// Acting user
    pub user_id: String,
}

impl TenantAuth {
    /// Create tenant identity
    #[must_use]
    pub fn new(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Estimate sent before a model call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WillSendModelRequest {
    /// Billed tenant
    pub auth: TenantAuth,
    /// Plan the call belongs to
    pub plan_id: String,
    /// Estimated input tokens
    pub input_tokens: usize,
    /// Estimated output tokens
    pub output_tokens: usize,
    /// Model name as sent to the provider
    pub model_name: String,
}

/// Accounting record sent after a model call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidSendModelRequest {
    /// Billed tenant
    pub auth: TenantAuth,
    /// Plan the call belongs to
    pub plan_id: String,
    /// Actual or locally counted input tokens
    pub input_tokens: usize,
    /// Actual or locally counted output tokens
    pub output_tokens: usize,
    /// Model name as sent to the provider
    pub model_name: String,
    /// Provider that served the call
    pub provider: ProviderComposite,
    /// Model pack in use
    pub model_pack: String,
    /// Role that made the call
    pub role: ModelRole,
    /// Human-readable purpose
    pub purpose: String,
}

/// Metering collaborator
///
/// `will_send_model_request` may veto a call. Errors from
/// `did_send_model_request` are reported to the caller, which decides
/// whether they are fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelHooks: Send + Sync {
    /// Called before a model request; an error vetoes it
    async fn will_send_model_request(&self, params: &WillSendModelRequest) -> Result<(), HookError>;

    /// Called after a model request
    async fn did_send_model_request(&self, params: &DidSendModelRequest) -> Result<(), HookError>;
}

/// Hooks that accept everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl ModelHooks for NoopHooks {
    async fn will_send_model_request(&self, _params: &WillSendModelRequest) -> Result<(), HookError> {
        Ok(())
    }

    async fn did_send_model_request(&self, _params: &DidSendModelRequest) -> Result<(), HookError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn will_send() -> WillSendModelRequest {
        WillSendModelRequest {
            auth: TenantAuth::new("org", "user"),
            plan_id: "plan".into(),
            input_tokens: 10,
            output_tokens: 5,
            model_name: "gpt".into(),
        }
    }

    #[tokio::test]
    async fn noop_accepts() {
        assert!(NoopHooks.will_send_model_request(&will_send()).await.is_ok());
    }

    #[tokio::test]
    async fn mock_can_veto() {
        let mut hooks = MockModelHooks::new();
        hooks
            .expect_will_send_model_request()
            .withf(|params| params.input_tokens == 10)
            .times(1)
            .returning(|_| Err(HookError::Rejected("quota exceeded".into())));

        let err = hooks.will_send_model_request(&will_send()).await.unwrap_err();
        assert_eq!(err, HookError::Rejected("quota exceeded".into()));
    }
}
