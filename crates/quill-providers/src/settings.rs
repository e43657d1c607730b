//! Plan settings and build policy
//!
//! [`PlanSettings`] is the per-plan settings object handed to the resolver
//! and the build orchestrator: the model pack, installation-specific custom
//! providers, and overrides of the build retry policy.

use crate::error::ConfigError;
use crate::model::{BaseModelUsesProvider, ModelId, ModelProviderConfig, ProviderComposite};
use crate::role::{ModelRole, ModelRoleConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Structured edit attempts allowed per file, and transport attempts per request
pub const MAX_BUILD_ERROR_RETRIES: u32 = 3;
/// Whole-file attempts per epoch
pub const FIX_SYNTAX_RETRIES: u32 = 2;
/// Whole-file epochs
pub const FIX_SYNTAX_EPOCHS: u32 = 2;

/// Build retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Cap on structured edit retries and on transport attempts per request
    pub max_build_error_retries: u32,
    /// Whole-file attempts sharing one base context
    pub fix_syntax_retries: u32,
    /// Number of whole-file epochs
    pub fix_syntax_epochs: u32,
    /// Base delay of the semi-exponential backoff
    pub retry_base_delay_ms: u64,
    /// Upper bound on one syntax check
    pub syntax_check_timeout_ms: u64,
}

impl BuildConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed input and
    /// `ConfigError::Invalid` when [`Self::validate`] fails.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// IO, parse and validation errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&input)
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// `ConfigError::Invalid` when epochs are configured without retries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fix_syntax_retries == 0 && self.fix_syntax_epochs > 0 {
            return Err(ConfigError::Invalid(
                "fix_syntax_epochs requires fix_syntax_retries > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// With structured edit / transport cap
    #[inline]
    #[must_use]
    pub fn with_max_build_error_retries(mut self, max: u32) -> Self {
        self.max_build_error_retries = max;
        self
    }

    /// With whole-file budget
    #[inline]
    #[must_use]
    pub fn with_fix_syntax(mut self, retries: u32, epochs: u32) -> Self {
        self.fix_syntax_retries = retries;
        self.fix_syntax_epochs = epochs;
        self
    }

    /// With backoff base
    #[inline]
    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With syntax check timeout
    #[inline]
    #[must_use]
    pub fn with_syntax_check_timeout(mut self, timeout: Duration) -> Self {
        self.syntax_check_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Total whole-file attempts across all epochs
    #[inline]
    #[must_use]
    pub fn max_whole_file_retries(&self) -> u32 {
        self.fix_syntax_retries.saturating_mul(self.fix_syntax_epochs)
    }

    /// Backoff base as a duration
    #[inline]
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Syntax check timeout as a duration
    #[inline]
    #[must_use]
    pub fn syntax_check_timeout(&self) -> Duration {
        Duration::from_millis(self.syntax_check_timeout_ms)
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_build_error_retries: MAX_BUILD_ERROR_RETRIES,
            fix_syntax_retries: FIX_SYNTAX_RETRIES,
            fix_syntax_epochs: FIX_SYNTAX_EPOCHS,
            retry_base_delay_ms: 1_000,
            syntax_check_timeout_ms: 5_000,
        }
    }
}

/// Named set of role configs used by a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPack {
    /// Pack name, reported to metering
    pub name: String,
    /// Role applying structured edits
    pub builder: ModelRoleConfig,
    /// Role rewriting whole files; `builder` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whole_file_builder: Option<ModelRoleConfig>,
    /// Role summarizing the conversation
    pub plan_summary: ModelRoleConfig,
}

impl ModelPack {
    /// Role used for whole-file rewrites
    #[inline]
    #[must_use]
    pub fn whole_file_builder(&self) -> &ModelRoleConfig {
        self.whole_file_builder.as_ref().unwrap_or(&self.builder)
    }

    /// Role config by role
    #[must_use]
    pub fn role(&self, role: ModelRole) -> Option<&ModelRoleConfig> {
        match role {
            ModelRole::Builder => Some(&self.builder),
            ModelRole::WholeFileBuilder => Some(self.whole_file_builder()),
            ModelRole::PlanSummary => Some(&self.plan_summary),
            _ => None,
        }
    }
}

impl Default for ModelPack {
    fn default() -> Self {
        Self {
            name: "daily-driver".to_string(),
            builder: ModelRoleConfig::new(ModelRole::Builder, "anthropic/claude-sonnet-4")
                .with_large_context_fallback(ModelRoleConfig::new(
                    ModelRole::Builder,
                    "google/gemini-2.5-pro",
                ))
                .with_error_fallback(ModelRoleConfig::new(ModelRole::Builder, "openai/gpt-4.1")),
            whole_file_builder: Some(
                ModelRoleConfig::new(ModelRole::WholeFileBuilder, "openai/o4-mini")
                    .with_large_context_fallback(ModelRoleConfig::new(
                        ModelRole::WholeFileBuilder,
                        "google/gemini-2.5-pro",
                    )),
            ),
            plan_summary: ModelRoleConfig::new(ModelRole::PlanSummary, "openai/o4-mini")
                .with_sampling(0.2, 0.2),
        }
    }
}

/// Per-plan settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSettings {
    /// Role configs in use
    pub model_pack: ModelPack,
    /// Installation-specific provider uses appended after the built-ins
    pub uses_custom_provider_by_model_id: HashMap<ModelId, Vec<BaseModelUsesProvider>>,
    /// Installation-specific provider configs
    pub custom_providers: Vec<ModelProviderConfig>,
    /// Build retry policy overrides
    pub build: BuildConfig,
}

impl PlanSettings {
    /// Parse from TOML
    ///
    /// # Errors
    /// Parse errors and build config validation errors.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(input)?;
        settings.build.validate()?;
        Ok(settings)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// IO, parse and validation errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&input)
    }

    /// Custom provider uses for a model
    #[must_use]
    pub fn custom_uses(&self, model_id: &ModelId) -> &[BaseModelUsesProvider] {
        self.uses_custom_provider_by_model_id
            .get(model_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Installation-specific provider config
    #[must_use]
    pub fn custom_provider(&self, composite: &ProviderComposite) -> Option<&ModelProviderConfig> {
        self.custom_providers
            .iter()
            .find(|config| &config.composite() == composite)
    }

    /// With custom provider uses for a model
    #[must_use]
    pub fn with_custom_uses(
        mut self,
        model_id: impl Into<ModelId>,
        uses: Vec<BaseModelUsesProvider>,
    ) -> Self {
        self.uses_custom_provider_by_model_id
            .insert(model_id.into(), uses);
        self
    }

    /// With a custom provider config
    #[must_use]
    pub fn with_custom_provider(mut self, config: ModelProviderConfig) -> Self {
        self.custom_providers.push(config);
        self
    }

    /// With build policy
    #[inline]
    #[must_use]
    pub fn with_build_config(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }
}
