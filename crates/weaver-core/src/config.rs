//! Configuration file support.
//!
//! Settings come from layered TOML files plus environment overrides:
//!
//! 1. Built-in defaults
//! 2. Global config (`~/.weaver/config.toml`)
//! 3. Local config (`./weaver.toml`) or an explicit path
//! 4. `WEAVER_*` environment variables
//!
//! Later layers override earlier ones field by field.

use crate::blocks::MergeStrategy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use weaver_abstraction::ModelParameters;
use weaver_models::{ModelConfig, ModelFactory};

/// Environment variable overriding `server.address`.
pub const ENV_ADDRESS: &str = "WEAVER_ADDRESS";
/// Environment variable overriding `model.model_type`.
pub const ENV_MODEL_TYPE: &str = "WEAVER_MODEL_TYPE";
/// Environment variable overriding `model.model_id`.
pub const ENV_MODEL_ID: &str = "WEAVER_MODEL_ID";
/// Environment variable overriding `merge.strategy`.
pub const ENV_MERGE_STRATEGY: &str = "WEAVER_MERGE_STRATEGY";

const DEFAULT_ADDRESS: &str = "127.0.0.1:8787";
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Complete Weaver configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Default model selection.
    #[serde(default)]
    pub model: ModelSection,

    /// Merge behavior.
    #[serde(default)]
    pub merge: MergeConfig,
}

/// `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub address: String,

    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: DEFAULT_ADDRESS.to_string(), max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }
}

impl ServerConfig {
    /// Parses `address` into a socket address.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.address
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("server.address '{}': {e}", self.address)))
    }
}

/// `[model]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Provider name: `mock`, `openai` or `claude`.
    pub model_type: String,

    /// Model identifier sent to the provider.
    pub model_id: String,

    /// API key; the provider's environment variable is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Completion length cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ModelSection {
    fn default() -> Self {
        let parameters = ModelParameters::default();
        Self {
            model_type: "mock".to_string(),
            model_id: "mock-model".to_string(),
            api_key: None,
            base_url: None,
            temperature: parameters.temperature,
            max_tokens: parameters.max_tokens,
        }
    }
}

/// `[merge]` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Matching strategy for every merge this deployment performs.
    #[serde(default)]
    pub strategy: MergeStrategy,
}

/// One config file as written: every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    #[serde(default)]
    server: ServerLayer,
    #[serde(default)]
    model: ModelLayer,
    #[serde(default)]
    merge: MergeLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerLayer {
    address: Option<String>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelLayer {
    model_type: Option<String>,
    model_id: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MergeLayer {
    strategy: Option<MergeStrategy>,
}

impl Config {
    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".weaver")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("weaver.toml")
    }

    /// Parses a TOML document on top of the defaults.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_toml(content, "<inline>")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads one TOML file on top of the defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Discovers and loads configuration.
    ///
    /// The global file and the local file are optional. An `explicit` path
    /// replaces the local file and must exist. Environment overrides apply
    /// last.
    pub fn discover(explicit: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let global_path = Self::default_global_path();
        if global_path.exists() {
            config.apply_file(&global_path)?;
        }

        match explicit {
            Some(path) => config.apply_file(path)?,
            None => {
                let local_path = Self::default_local_path();
                if local_path.exists() {
                    config.apply_file(&local_path)?;
                }
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WEAVER_*` overrides looked up through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(address) = lookup(ENV_ADDRESS) {
            self.server.address = address;
        }
        if let Some(model_type) = lookup(ENV_MODEL_TYPE) {
            self.model.model_type = model_type;
        }
        if let Some(model_id) = lookup(ENV_MODEL_ID) {
            self.model.model_id = model_id;
        }
        if let Some(strategy) = lookup(ENV_MERGE_STRATEGY) {
            self.merge.strategy = strategy
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("{ENV_MERGE_STRATEGY}: {e}")))?;
        }
        Ok(())
    }

    /// Checks values that TOML types alone cannot.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.socket_addr()?;
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue("server.max_body_bytes must be positive".to_string()));
        }
        ModelFactory::parse_type(&self.model.model_type)
            .map_err(|e| ConfigError::InvalidValue(format!("model.model_type: {e}")))?;
        if self.model.model_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue("model.model_id must not be empty".to_string()));
        }
        if let Some(temperature) = self.model.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidValue(format!(
                    "model.temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }
        Ok(())
    }

    /// Provider settings for [`ModelFactory::create`].
    pub fn model_config(&self) -> ConfigResult<ModelConfig> {
        let model_type = ModelFactory::parse_type(&self.model.model_type)
            .map_err(|e| ConfigError::InvalidValue(format!("model.model_type: {e}")))?;

        let mut config = ModelConfig::new(model_type, self.model.model_id.clone());
        if let Some(api_key) = &self.model.api_key {
            config = config.with_api_key(api_key.clone());
        }
        if let Some(base_url) = &self.model.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }

    /// Default sampling parameters for generation requests.
    pub fn model_parameters(&self) -> ModelParameters {
        ModelParameters {
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            ..ModelParameters::default()
        }
    }

    fn apply_file(&mut self, path: &Path) -> ConfigResult<()> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Loading configuration file");
        self.apply_toml(&content, &path.display().to_string())
    }

    fn apply_toml(&mut self, content: &str, origin: &str) -> ConfigResult<()> {
        let layer: ConfigLayer =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("{origin}: {e}")))?;
        self.merge_layer(layer);
        Ok(())
    }

    fn merge_layer(&mut self, layer: ConfigLayer) {
        let ConfigLayer { server, model, merge } = layer;

        if let Some(address) = server.address {
            self.server.address = address;
        }
        if let Some(max_body_bytes) = server.max_body_bytes {
            self.server.max_body_bytes = max_body_bytes;
        }

        if let Some(model_type) = model.model_type {
            self.model.model_type = model_type;
        }
        if let Some(model_id) = model.model_id {
            self.model.model_id = model_id;
        }
        if model.api_key.is_some() {
            self.model.api_key = model.api_key;
        }
        if model.base_url.is_some() {
            self.model.base_url = model.base_url;
        }
        if model.temperature.is_some() {
            self.model.temperature = model.temperature;
        }
        if model.max_tokens.is_some() {
            self.model.max_tokens = model.max_tokens;
        }

        if let Some(strategy) = merge.strategy {
            self.merge.strategy = strategy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use weaver_models::ModelType;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.address, "127.0.0.1:8787");
        assert_eq!(config.server.max_body_bytes, 2_097_152);
        assert_eq!(config.model.model_type, "mock");
        assert_eq!(config.merge.strategy, MergeStrategy::Language);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [merge]
            strategy = "filename"

            [model]
            model_id = "gpt-4o"
            model_type = "openai"
            "#,
        )
        .unwrap();

        assert_eq!(config.merge.strategy, MergeStrategy::Filename);
        assert_eq!(config.model.model_id, "gpt-4o");
        assert_eq!(config.model.temperature, Some(0.2));
        assert_eq!(config.server.address, "127.0.0.1:8787");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weaver.toml");
        std::fs::write(&path, "[server]\naddress = \"0.0.0.0:9000\"\nmax_body_bytes = 1024\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.server.socket_addr().unwrap().port(), 9000);
        assert_eq!(config.server.max_body_bytes, 1024);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load_from_file(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Config::from_toml_str("[server"), Err(ConfigError::ParseError(_))));
        assert!(matches!(
            Config::from_toml_str("[merge]\nstrategy = \"fuzzy\""),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(Config::from_toml_str("[extra]\nkey = 1"), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml_str("[server]\naddress = \"not an address\""),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[model]\nmodel_type = \"gemini\""),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[model]\ntemperature = 3.5"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_later_layer_overrides_earlier() {
        let mut config = Config::default();
        config.apply_toml("[model]\nmodel_id = \"first\"\napi_key = \"k1\"", "global").unwrap();
        config.apply_toml("[model]\nmodel_id = \"second\"", "local").unwrap();

        assert_eq!(config.model.model_id, "second");
        assert_eq!(config.model.api_key.as_deref(), Some("k1"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ADDRESS, "127.0.0.1:0"),
            (ENV_MODEL_ID, "claude-sonnet-4-5"),
            (ENV_MODEL_TYPE, "claude"),
            (ENV_MERGE_STRATEGY, "by-filename"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(config.server.address, "127.0.0.1:0");
        assert_eq!(config.model.model_id, "claude-sonnet-4-5");
        assert_eq!(config.merge.strategy, MergeStrategy::Filename);
        assert_eq!(config.model_config().unwrap().model_type, ModelType::Claude);
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(|_| Some("  ".to_string())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_bad_env_strategy() {
        let mut config = Config::default();
        let result =
            config.apply_env_overrides(|key| (key == ENV_MERGE_STRATEGY).then(|| "diff".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_model_config_conversion() {
        let config = Config::from_toml_str(
            "[model]\nmodel_type = \"openai\"\nmodel_id = \"gpt-4o\"\napi_key = \"k\"\nbase_url = \"http://localhost:1234/v1\"\nmax_tokens = 512",
        )
        .unwrap();

        let model_config = config.model_config().unwrap();
        assert_eq!(model_config.model_type, ModelType::OpenAI);
        assert_eq!(model_config.api_key.as_deref(), Some("k"));
        assert_eq!(model_config.base_url.as_deref(), Some("http://localhost:1234/v1"));
        assert_eq!(config.model_parameters().max_tokens, Some(512));
    }
}
