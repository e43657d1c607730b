//! Quill Providers
//!
//! Model role configuration and provider fallback resolution.
//!
//! # Core Concepts
//!
//! - [`ModelRoleConfig`]: a role's base model plus an owned tree of fallback roles
//! - [`ProviderRegistry`]: read-only model/provider tables, built-ins loaded once
//! - [`ProviderResolver`]: flattens a role tree into [`ProviderOptions`]
//! - [`ProviderOptions::condense`]: min-priority, publisher-union merge
//! - [`PlanSettings`] / [`BuildConfig`]: per-plan overrides
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_providers::{ModelRole, ModelRoleConfig, ProviderResolver};
//!
//! let role = ModelRoleConfig::new(ModelRole::Builder, "anthropic/claude-sonnet-4")
//!     .with_error_fallback(ModelRoleConfig::new(ModelRole::Builder, "openai/gpt-4.1"));
//!
//! let options = ProviderResolver::builtin().resolve(&role, None);
//! for (provider, option) in options.ranked() {
//!     println!("{provider}: {}", option.priority);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod model;
mod options;
mod registry;
mod resolver;
mod role;
mod settings;

pub use error::{ConfigError, RegistryError};
pub use model::{
    BaseModel, BaseModelUsesProvider, ModelId, ModelProvider, ModelProviderConfig, ModelPublisher,
    ProviderComposite,
};
pub use options::{ProviderOption, ProviderOptions};
pub use registry::ProviderRegistry;
pub use resolver::ProviderResolver;
pub use role::{FallbackKind, ModelRole, ModelRoleConfig, MAX_FALLBACK_DEPTH};
pub use settings::{
    BuildConfig, ModelPack, PlanSettings, FIX_SYNTAX_EPOCHS, FIX_SYNTAX_RETRIES,
    MAX_BUILD_ERROR_RETRIES,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
