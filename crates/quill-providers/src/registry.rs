//! Provider registry
//!
//! Read-only lookup tables mapping a model id to its built-in provider uses,
//! provider kinds to their endpoint configuration, and model ids to base
//! model metadata. The built-in tables are initialized once per process and
//! shared through [`ProviderRegistry::builtin`].

use crate::error::RegistryError;
use crate::model::{
    BaseModel, BaseModelUsesProvider, ModelId, ModelProvider, ModelProviderConfig, ModelPublisher,
    ProviderComposite,
};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

static BUILTIN: Lazy<ProviderRegistry> = Lazy::new(builtin_registry);

/// Model, provider and uses-provider tables
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    provider_configs: HashMap<ProviderComposite, Arc<ModelProviderConfig>>,
    base_models: HashMap<ModelId, BaseModel>,
    uses_providers: HashMap<ModelId, Vec<BaseModelUsesProvider>>,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    providers: Vec<ModelProviderConfig>,
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(flatten)]
    model: BaseModel,
    #[serde(default)]
    providers: Vec<BaseModelUsesProvider>,
}

impl ProviderRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide built-in registry
    #[inline]
    #[must_use]
    pub fn builtin() -> &'static ProviderRegistry {
        &BUILTIN
    }

    /// Parse a registry from TOML
    ///
    /// ```toml
    /// [[providers]]
    /// provider = "openrouter"
    /// base_url = "https://openrouter.ai/api/v1"
    /// api_key_env_var = "OPENROUTER_API_KEY"
    ///
    /// [[models]]
    /// model_id = "anthropic/claude-sonnet-4"
    /// publisher = "anthropic"
    /// max_tokens = 200000
    ///
    /// [[models.providers]]
    /// provider = "openrouter"
    /// model_name = "anthropic/claude-sonnet-4"
    /// ```
    ///
    /// # Errors
    /// - `RegistryError::Parse` on malformed TOML
    /// - `RegistryError::DuplicateModel` if a model id repeats
    /// - `RegistryError::UnnamedCustomProvider` for a nameless custom provider
    pub fn from_toml_str(input: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument = toml::from_str(input)?;
        let mut registry = Self::new();

        for config in document.providers {
            if config.provider == ModelProvider::Custom && config.custom_provider.is_none() {
                return Err(RegistryError::UnnamedCustomProvider {
                    base_url: config.base_url,
                });
            }
            registry = registry.with_provider(config);
        }

        for entry in document.models {
            if registry.base_models.contains_key(&entry.model.model_id) {
                return Err(RegistryError::DuplicateModel(entry.model.model_id));
            }
            registry = registry.with_model(entry.model, entry.providers);
        }

        Ok(registry)
    }

    /// Register a provider config
    #[must_use]
    pub fn with_provider(mut self, config: ModelProviderConfig) -> Self {
        self.provider_configs
            .insert(config.composite(), Arc::new(config));
        self
    }

    /// Register a model with its built-in provider uses (in preference order)
    #[must_use]
    pub fn with_model(mut self, model: BaseModel, uses: Vec<BaseModelUsesProvider>) -> Self {
        self.uses_providers.insert(model.model_id.clone(), uses);
        self.base_models.insert(model.model_id.clone(), model);
        self
    }

    /// Provider configuration by composite
    #[inline]
    #[must_use]
    pub fn provider_config(&self, composite: &ProviderComposite) -> Option<&Arc<ModelProviderConfig>> {
        self.provider_configs.get(composite)
    }

    /// Base model metadata
    #[inline]
    #[must_use]
    pub fn base_model(&self, model_id: &ModelId) -> Option<&BaseModel> {
        self.base_models.get(model_id)
    }

    /// Built-in provider uses for a model, most preferred first
    #[inline]
    #[must_use]
    pub fn uses_providers(&self, model_id: &ModelId) -> &[BaseModelUsesProvider] {
        self.uses_providers
            .get(model_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of known models
    #[inline]
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.base_models.len()
    }
}

fn builtin_registry() -> ProviderRegistry {
    use BaseModelUsesProvider as Uses;
    use ModelProvider::{Anthropic, DeepSeek, GoogleAiStudio, Ollama, OpenAI, OpenRouter};

    ProviderRegistry::new()
        .with_provider(
            ModelProviderConfig::new(OpenAI, "https://api.openai.com/v1")
                .with_api_key_env_var("OPENAI_API_KEY"),
        )
        .with_provider(
            ModelProviderConfig::new(Anthropic, "https://api.anthropic.com/v1")
                .with_api_key_env_var("ANTHROPIC_API_KEY"),
        )
        .with_provider(
            ModelProviderConfig::new(
                GoogleAiStudio,
                "https://generativelanguage.googleapis.com/v1beta/openai",
            )
            .with_api_key_env_var("GEMINI_API_KEY"),
        )
        .with_provider(
            ModelProviderConfig::new(OpenRouter, "https://openrouter.ai/api/v1")
                .with_api_key_env_var("OPENROUTER_API_KEY"),
        )
        .with_provider(
            ModelProviderConfig::new(DeepSeek, "https://api.deepseek.com/v1")
                .with_api_key_env_var("DEEPSEEK_API_KEY"),
        )
        .with_provider(ModelProviderConfig::new(Ollama, "http://localhost:11434/v1"))
        .with_model(
            BaseModel::new("openai/gpt-4.1", ModelPublisher::OpenAI, 1_047_576)
                .with_output(32_768, 32_768),
            vec![
                Uses::new(OpenAI, "gpt-4.1"),
                Uses::new(OpenRouter, "openai/gpt-4.1"),
            ],
        )
        .with_model(
            BaseModel::new("openai/o4-mini", ModelPublisher::OpenAI, 200_000)
                .with_output(100_000, 30_000),
            vec![
                Uses::new(OpenAI, "o4-mini"),
                Uses::new(OpenRouter, "openai/o4-mini"),
            ],
        )
        .with_model(
            BaseModel::new("anthropic/claude-sonnet-4", ModelPublisher::Anthropic, 200_000)
                .with_output(64_000, 20_000),
            vec![
                Uses::new(Anthropic, "claude-sonnet-4-20250514"),
                Uses::new(OpenRouter, "anthropic/claude-sonnet-4"),
            ],
        )
        .with_model(
            BaseModel::new("anthropic/claude-opus-4", ModelPublisher::Anthropic, 200_000)
                .with_output(32_000, 20_000),
            vec![
                Uses::new(Anthropic, "claude-opus-4-20250514"),
                Uses::new(OpenRouter, "anthropic/claude-opus-4"),
            ],
        )
        .with_model(
            BaseModel::new("google/gemini-2.5-pro", ModelPublisher::Google, 1_048_576)
                .with_output(65_535, 32_000),
            vec![
                Uses::new(GoogleAiStudio, "gemini-2.5-pro"),
                Uses::new(OpenRouter, "google/gemini-2.5-pro"),
            ],
        )
        .with_model(
            BaseModel::new("deepseek/r1", ModelPublisher::DeepSeek, 128_000)
                .with_output(32_768, 20_000),
            vec![
                Uses::new(DeepSeek, "deepseek-reasoner"),
                Uses::new(OpenRouter, "deepseek/deepseek-r1"),
            ],
        )
        .with_model(
            BaseModel::new("qwen/qwen3-coder", ModelPublisher::Qwen, 262_144)
                .with_output(65_536, 16_000),
            vec![
                Uses::new(OpenRouter, "qwen/qwen3-coder"),
                Uses::new(Ollama, "qwen3-coder"),
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_shared() {
        let a = ProviderRegistry::builtin();
        let b = ProviderRegistry::builtin();
        assert!(std::ptr::eq(a, b));
        assert!(a.model_count() >= 5);
    }

    #[test]
    fn builtin_uses_keep_order() {
        let uses = ProviderRegistry::builtin().uses_providers(&ModelId::new("anthropic/claude-sonnet-4"));
        assert_eq!(uses[0].provider, ModelProvider::Anthropic);
        assert_eq!(uses[1].provider, ModelProvider::OpenRouter);
    }

    #[test]
    fn unknown_model_has_no_uses() {
        let registry = ProviderRegistry::builtin();
        assert!(registry.uses_providers(&ModelId::new("nope")).is_empty());
        assert!(registry.base_model(&ModelId::new("nope")).is_none());
    }

    #[test]
    fn from_toml_parses_models_and_providers() {
        let registry = ProviderRegistry::from_toml_str(
            r#"
[[providers]]
provider = "custom"
custom_provider = "gateway"
base_url = "http://localhost:8080"

[[models]]
model_id = "local/coder"
publisher = "qwen"
max_tokens = 32000

[[models.providers]]
provider = "custom"
custom_provider = "gateway"
model_name = "coder"
"#,
        )
        .unwrap();

        let id = ModelId::new("local/coder");
        assert_eq!(registry.base_model(&id).map(|m| m.max_tokens), Some(32_000));
        assert_eq!(registry.uses_providers(&id).len(), 1);
        assert!(registry
            .provider_config(&ProviderComposite::custom("gateway"))
            .is_some());
    }

    #[test]
    fn from_toml_rejects_duplicate_model() {
        let result = ProviderRegistry::from_toml_str(
            r#"
[[models]]
model_id = "a"
publisher = "openai"
max_tokens = 1

[[models]]
model_id = "a"
publisher = "openai"
max_tokens = 2
"#,
        );
        assert!(matches!(result, Err(RegistryError::DuplicateModel(_))));
    }

    #[test]
    fn from_toml_rejects_unnamed_custom_provider() {
        let result = ProviderRegistry::from_toml_str(
            r#"
[[providers]]
provider = "custom"
base_url = "http://localhost:8080"
"#,
        );
        assert!(matches!(
            result,
            Err(RegistryError::UnnamedCustomProvider { .. })
        ));
    }
}
