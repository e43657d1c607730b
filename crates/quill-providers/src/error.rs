//! Error types for provider configuration
//!
//! Resolution itself never fails; these cover loading registries and
//! settings from external files.

use crate::model::ModelId;
use std::path::PathBuf;

/// Errors while building a provider registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registry document could not be parsed
    #[error("invalid registry document: {0}")]
    Parse(#[from] toml::de::Error),

    /// The same model id was declared twice
    #[error("duplicate model id: {0}")]
    DuplicateModel(ModelId),

    /// A custom provider config lacks a name
    #[error("custom provider at {base_url} has no name")]
    UnnamedCustomProvider { base_url: String },
}

/// Errors while loading settings or build configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading a config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but are inconsistent
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_display() {
        let err = RegistryError::DuplicateModel(ModelId::new("openai/gpt-4.1"));
        assert!(err.to_string().contains("openai/gpt-4.1"));
    }

    #[test]
    fn config_error_io_display() {
        let err = ConfigError::io_error(
            "/tmp/missing.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("missing.toml"));
    }
}
