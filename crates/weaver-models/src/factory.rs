//! Model factory for creating model instances from configuration.

use crate::{ClaudeModel, MockModel, OpenAIModel};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};
use weaver_abstraction::{Model, ModelError};

/// Model type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Mock model for testing.
    Mock,
    /// Anthropic Claude model.
    Claude,
    /// OpenAI (or OpenAI-compatible) model.
    OpenAI,
}

impl FromStr for ModelType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "claude" | "anthropic" => Ok(Self::Claude),
            "openai" | "openai-compatible" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mock => "mock",
            Self::Claude => "claude",
            Self::OpenAI => "openai",
        };
        f.write_str(name)
    }
}

/// Model configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// The type of model to create.
    pub model_type: ModelType,
    /// The model ID (e.g., "gpt-4o", "claude-sonnet-4-5").
    pub model_id: String,
    /// Optional API key (if not provided, will be loaded from environment).
    pub api_key: Option<String>,
    /// Optional endpoint override.
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// Creates a new `ModelConfig` with the given type and model ID.
    #[must_use]
    pub fn new(model_type: ModelType, model_id: String) -> Self {
        Self { model_type, model_id, api_key: None, base_url: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the endpoint for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Same provider and credentials, different model id.
    #[must_use]
    pub fn with_model_id(&self, model_id: String) -> Self {
        Self { model_id, ..self.clone() }
    }
}

/// Factory for creating model instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a model instance from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if model creation fails (e.g., missing API key).
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Model>, ModelError> {
        debug!(
            model_type = %config.model_type,
            model_id = %config.model_id,
            "Creating model instance"
        );

        match config.model_type {
            ModelType::Mock => Ok(Arc::new(MockModel::new(config.model_id))),
            ModelType::Claude => {
                let mut model = match config.api_key {
                    Some(api_key) => ClaudeModel::with_api_key(config.model_id, api_key),
                    None => ClaudeModel::new(config.model_id)?,
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                Ok(Arc::new(model))
            }
            ModelType::OpenAI => {
                let mut model = match config.api_key {
                    Some(api_key) => OpenAIModel::with_api_key(config.model_id, api_key),
                    None => OpenAIModel::new(config.model_id)?,
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                Ok(Arc::new(model))
            }
        }
    }

    /// Parses a model type string.
    ///
    /// # Errors
    /// Returns `UnsupportedModelProvider` for unknown names.
    pub fn parse_type(model_type_str: &str) -> Result<ModelType, ModelError> {
        ModelType::from_str(model_type_str).map_err(|()| {
            error!(model_type = %model_type_str, "Unrecognized model type");
            ModelError::UnsupportedModelProvider(format!("Unrecognized model type: {model_type_str}"))
        })
    }
}
