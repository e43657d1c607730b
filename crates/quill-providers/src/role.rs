//! Model roles and their fallback trees
//!
//! A [`ModelRoleConfig`] names the purpose of a model call and the base
//! model that serves it. Each role may carry up to four fallback roles, each
//! itself a full role config. The tree is owned, so it cannot contain cycles,
//! but depth comes from user configuration and every walk is bounded by
//! [`MAX_FALLBACK_DEPTH`].

use crate::model::ModelId;
use crate::registry::ProviderRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest fallback level any traversal will visit
pub const MAX_FALLBACK_DEPTH: usize = 8;

/// Purpose of a model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Plans and replies in the conversation
    Planner,
    /// Writes code blocks for the plan
    Coder,
    /// Applies structured edits to files
    Builder,
    /// Rewrites whole files when structured edits keep failing
    WholeFileBuilder,
    /// Summarizes the conversation
    PlanSummary,
    /// Names plans
    Name,
    /// Writes commit messages
    CommitMessages,
}

impl ModelRole {
    /// Stable snake_case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Coder => "coder",
            Self::Builder => "builder",
            Self::WholeFileBuilder => "whole_file_builder",
            Self::PlanSummary => "plan_summary",
            Self::Name => "name",
            Self::CommitMessages => "commit_messages",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which fallback slot a child role occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackKind {
    /// Used when the primary errors
    Error,
    /// Used when the input exceeds the primary's context
    LargeContext,
    /// Used when the output exceeds the primary's limit
    LargeOutput,
    /// Stronger model for hard cases
    StrongModel,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.1
}

/// Model role configuration with its fallback tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRoleConfig {
    /// Role this config serves
    pub role: ModelRole,
    /// Base model identifier
    pub model_id: ModelId,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Override of the base model's reserved output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_output_tokens: Option<usize>,
    /// Fallback when the primary errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_fallback: Option<Box<ModelRoleConfig>>,
    /// Fallback for inputs beyond the context window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_context_fallback: Option<Box<ModelRoleConfig>>,
    /// Fallback for outputs beyond the output limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_output_fallback: Option<Box<ModelRoleConfig>>,
    /// Stronger model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strong_model: Option<Box<ModelRoleConfig>>,
}

impl ModelRoleConfig {
    /// Create role config with no fallbacks
    #[must_use]
    pub fn new(role: ModelRole, model_id: impl Into<ModelId>) -> Self {
        Self {
            role,
            model_id: model_id.into(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            reserved_output_tokens: None,
            error_fallback: None,
            large_context_fallback: None,
            large_output_fallback: None,
            strong_model: None,
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

    /// With reserved output tokens override
    #[inline]
    #[must_use]
    pub fn with_reserved_output_tokens(mut self, tokens: usize) -> Self {
        self.reserved_output_tokens = Some(tokens);
        self
    }

    /// With error fallback
    #[inline]
    #[must_use]
    pub fn with_error_fallback(mut self, fallback: ModelRoleConfig) -> Self {
        self.error_fallback = Some(Box::new(fallback));
        self
    }

    /// With large context fallback
    #[inline]
    #[must_use]
    pub fn with_large_context_fallback(mut self, fallback: ModelRoleConfig) -> Self {
        self.large_context_fallback = Some(Box::new(fallback));
        self
    }

    /// With large output fallback
    #[inline]
    #[must_use]
    pub fn with_large_output_fallback(mut self, fallback: ModelRoleConfig) -> Self {
        self.large_output_fallback = Some(Box::new(fallback));
        self
    }

    /// With stronger model
    #[inline]
    #[must_use]
    pub fn with_strong_model(mut self, fallback: ModelRoleConfig) -> Self {
        self.strong_model = Some(Box::new(fallback));
        self
    }

    /// Populated fallbacks in evaluation order
    pub fn fallbacks(&self) -> impl Iterator<Item = (FallbackKind, &ModelRoleConfig)> {
        [
            (FallbackKind::Error, self.error_fallback.as_deref()),
            (FallbackKind::LargeContext, self.large_context_fallback.as_deref()),
            (FallbackKind::LargeOutput, self.large_output_fallback.as_deref()),
            (FallbackKind::StrongModel, self.strong_model.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, role)| role.map(|r| (kind, r)))
    }

    /// Output tokens to reserve for a request on this role
    #[must_use]
    pub fn reserved_output_tokens(&self, registry: &ProviderRegistry) -> usize {
        self.reserved_output_tokens.unwrap_or_else(|| {
            registry
                .base_model(&self.model_id)
                .map_or(0, |m| m.default_reserved_output_tokens)
        })
    }

    /// Role that can take `input_tokens` of prompt
    ///
    /// Follows `large_context_fallback` while the input does not fit the
    /// current model's window minus its reserved output. Stops at the first
    /// role that fits, at a role without that fallback, or at a model the
    /// registry does not know.
    #[must_use]
    pub fn role_for_input_tokens(&self, input_tokens: usize, registry: &ProviderRegistry) -> &Self {
        let mut current = self;
        for _ in 0..MAX_FALLBACK_DEPTH {
            let Some(model) = registry.base_model(&current.model_id) else {
                break;
            };
            let limit = model
                .max_tokens
                .saturating_sub(current.reserved_output_tokens(registry));
            if input_tokens <= limit {
                break;
            }
            match current.large_context_fallback.as_deref() {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Role that can produce `output_tokens`
    #[must_use]
    pub fn role_for_output_tokens(&self, output_tokens: usize, registry: &ProviderRegistry) -> &Self {
        let mut current = self;
        for _ in 0..MAX_FALLBACK_DEPTH {
            let Some(model) = registry.base_model(&current.model_id) else {
                break;
            };
            if model.max_output_tokens == 0 || output_tokens <= model.max_output_tokens {
                break;
            }
            match current.large_output_fallback.as_deref() {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }
}
