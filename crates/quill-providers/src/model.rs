//! Model and provider identities
//!
//! The vocabulary shared by the registry, the role configuration and the
//! resolver:
//! - [`ModelId`] and [`BaseModel`] describe a model independent of who serves it
//! - [`ModelProvider`] and [`ModelProviderConfig`] describe a serving backend
//! - [`BaseModelUsesProvider`] pairs the two at a preference rank
//! - [`ProviderComposite`] is the key a resolved option is stored under

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a base model (e.g. `anthropic/claude-sonnet-4`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Create new model id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Organization that published a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPublisher {
    /// OpenAI
    OpenAI,
    /// Anthropic
    Anthropic,
    /// Google
    Google,
    /// DeepSeek
    DeepSeek,
    /// Alibaba Qwen
    Qwen,
    /// Mistral
    Mistral,
    /// Meta
    Meta,
    /// xAI
    XAi,
}

impl ModelPublisher {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::DeepSeek => "deepseek",
            Self::Qwen => "qwen",
            Self::Mistral => "mistral",
            Self::Meta => "meta",
            Self::XAi => "xai",
        }
    }
}

impl fmt::Display for ModelPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend kind able to serve models
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelProvider {
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
    /// Anthropic API
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Google AI Studio
    #[serde(rename = "google-ai-studio")]
    GoogleAiStudio,
    /// OpenRouter aggregator
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// DeepSeek API
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Local Ollama
    #[serde(rename = "ollama")]
    Ollama,
    /// Installation-defined provider, identified by name
    #[serde(rename = "custom")]
    Custom,
}

impl ModelProvider {
    /// Stable kebab-case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::GoogleAiStudio => "google-ai-studio",
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite provider identity
///
/// Keys a [`crate::ProviderOptions`] entry. Built-in providers are keyed by
/// kind alone; custom providers also carry their installation name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderComposite {
    /// Provider kind
    pub provider: ModelProvider,
    /// Name of the custom provider, when `provider` is `Custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_provider: Option<String>,
}

impl ProviderComposite {
    /// Composite for a built-in provider
    #[inline]
    #[must_use]
    pub fn builtin(provider: ModelProvider) -> Self {
        Self {
            provider,
            custom_provider: None,
        }
    }

    /// Composite for a named custom provider
    #[inline]
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            provider: ModelProvider::Custom,
            custom_provider: Some(name.into()),
        }
    }
}

impl fmt::Display for ProviderComposite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.custom_provider {
            Some(name) => write!(f, "{}|{}", self.provider, name),
            None => write!(f, "{}", self.provider),
        }
    }
}

/// Registry metadata for a base model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModel {
    /// Model identifier
    pub model_id: ModelId,
    /// Publisher of the model
    pub publisher: ModelPublisher,
    /// Context window in tokens
    pub max_tokens: usize,
    /// Hard limit on generated tokens
    #[serde(default)]
    pub max_output_tokens: usize,
    /// Output tokens reserved when estimating a request
    #[serde(default)]
    pub default_reserved_output_tokens: usize,
}

impl BaseModel {
    /// Create model metadata
    #[must_use]
    pub fn new(model_id: impl Into<ModelId>, publisher: ModelPublisher, max_tokens: usize) -> Self {
        Self {
            model_id: model_id.into(),
            publisher,
            max_tokens,
            max_output_tokens: 0,
            default_reserved_output_tokens: 0,
        }
    }

    /// With output limits
    #[inline]
    #[must_use]
    pub fn with_output(mut self, max_output_tokens: usize, reserved: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.default_reserved_output_tokens = reserved;
        self
    }
}

/// Static configuration of a provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProviderConfig {
    /// Provider kind
    pub provider: ModelProvider,
    /// Custom provider name (required for `Custom`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_provider: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Environment variable holding the API key, if one is needed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
}

impl ModelProviderConfig {
    /// Config for a built-in provider
    #[must_use]
    pub fn new(provider: ModelProvider, base_url: impl Into<String>) -> Self {
        Self {
            provider,
            custom_provider: None,
            base_url: base_url.into(),
            api_key_env_var: None,
        }
    }

    /// Config for a named custom provider
    #[must_use]
    pub fn custom(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider: ModelProvider::Custom,
            custom_provider: Some(name.into()),
            base_url: base_url.into(),
            api_key_env_var: None,
        }
    }

    /// With API key variable
    #[inline]
    #[must_use]
    pub fn with_api_key_env_var(mut self, var: impl Into<String>) -> Self {
        self.api_key_env_var = Some(var.into());
        self
    }

    /// Composite identity of this provider
    #[must_use]
    pub fn composite(&self) -> ProviderComposite {
        ProviderComposite {
            provider: self.provider,
            custom_provider: self.custom_provider.clone(),
        }
    }
}

/// A model may be served by a provider under a provider-specific name
///
/// Position in the uses-provider list is the preference rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModelUsesProvider {
    /// Provider kind
    pub provider: ModelProvider,
    /// Custom provider name (for `Custom`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_provider: Option<String>,
    /// Name the provider knows the model by
    pub model_name: String,
}

impl BaseModelUsesProvider {
    /// Built-in provider use
    #[must_use]
    pub fn new(provider: ModelProvider, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            custom_provider: None,
            model_name: model_name.into(),
        }
    }

    /// Custom provider use
    #[must_use]
    pub fn custom(name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            provider: ModelProvider::Custom,
            custom_provider: Some(name.into()),
            model_name: model_name.into(),
        }
    }

    /// Composite identity this use resolves under
    #[must_use]
    pub fn to_composite(&self) -> ProviderComposite {
        ProviderComposite {
            provider: self.provider,
            custom_provider: self.custom_provider.clone(),
        }
    }
}
