//! Project generation service.
//!
//! One request is one model call followed by one merge call. Nothing is
//! stored between requests: the caller sends the whole previous project and
//! gets the whole merged project back.

use crate::blocks::{MergeOutcome, MergeStrategy, merge_response};
use crate::config::Config;
use crate::error::{Result, WeaverError};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use weaver_abstraction::{Model, ModelParameters};
use weaver_models::{ModelConfig, ModelFactory};

/// Body of a generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// The natural-language change request.
    #[serde(default)]
    pub prompt: String,

    /// The full current project text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_project: Option<String>,

    /// Model id overriding the configured one for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Completion length override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    /// A request with only a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    /// Sets the previous project text.
    #[must_use]
    pub fn with_previous(mut self, previous_project: impl Into<String>) -> Self {
        self.previous_project = Some(previous_project.into());
        self
    }

    /// Rejects requests that must not reach the model.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(WeaverError::InvalidInput("prompt is required".to_string()));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(WeaverError::InvalidInput(format!(
                    "temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(WeaverError::InvalidInput("maxTokens must be positive".to_string()));
        }
        if self.model.as_deref().is_some_and(|model| model.trim().is_empty()) {
            return Err(WeaverError::InvalidInput("model must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Body of a merge-only request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// The full current project text.
    #[serde(default)]
    pub previous_project: String,

    /// Model output to fold into the project.
    pub response: String,
}

/// Result of a generation or merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// The merged project text.
    pub project: String,
    /// The model output exactly as received.
    pub raw_response: String,
    /// Blocks extracted from the model output.
    pub ai_blocks_count: usize,
    /// Blocks that replaced an existing block.
    pub matched_count: usize,
    /// Blocks appended to the end.
    pub appended_count: usize,
    /// Identifiers that were replaced.
    pub replaced: Vec<String>,
    /// Identifiers that found no target.
    pub unmatched: Vec<String>,
    /// The raw output was appended because it had no blocks.
    pub fallback: bool,
    /// Filenames that appeared on more than one existing block.
    pub ambiguous: Vec<String>,
}

impl GenerateResponse {
    /// Packs a merge outcome together with the text it came from.
    #[must_use]
    pub fn from_outcome(outcome: MergeOutcome, raw_response: String) -> Self {
        Self {
            project: outcome.merged_text,
            raw_response,
            ai_blocks_count: outcome.ai_blocks_count,
            matched_count: outcome.matched,
            appended_count: outcome.appended,
            replaced: outcome.replaced,
            unmatched: outcome.unmatched,
            fallback: outcome.fallback,
            ambiguous: outcome.ambiguous,
        }
    }
}

/// Turns change requests into merged projects.
#[derive(Clone)]
pub struct ProjectGenerator {
    model: Arc<dyn Model>,
    model_config: Option<ModelConfig>,
    strategy: MergeStrategy,
    parameters: ModelParameters,
}

impl std::fmt::Debug for ProjectGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectGenerator")
            .field("model", &self.model.model_id())
            .field("model_config", &self.model_config.as_ref().map(|c| c.model_type))
            .field("strategy", &self.strategy)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl ProjectGenerator {
    /// A generator around an existing model.
    ///
    /// Per-request model overrides are rejected unless a provider
    /// configuration is attached with [`with_model_config`](Self::with_model_config).
    #[must_use]
    pub fn new(model: Arc<dyn Model>, strategy: MergeStrategy) -> Self {
        Self { model, model_config: None, strategy, parameters: ModelParameters::default() }
    }

    /// Builds the configured model and generator.
    pub fn from_config(config: &Config) -> Result<Self> {
        let model_config = config.model_config()?;
        let model = ModelFactory::create(model_config.clone())?;
        Ok(Self::new(model, config.merge.strategy)
            .with_model_config(model_config)
            .with_parameters(config.model_parameters()))
    }

    /// Provider settings used to build per-request models.
    #[must_use]
    pub fn with_model_config(mut self, model_config: ModelConfig) -> Self {
        self.model_config = Some(model_config);
        self
    }

    /// Default sampling parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// The strategy every merge uses.
    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Id of the default model.
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Calls the model for `request` and merges its output into the previous project.
    ///
    /// # Errors
    /// - `InvalidInput` before any model call.
    /// - `ModelInvocation` if the call fails.
    /// - `EmptyModelOutput` if it returns only whitespace.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        request.validate()?;

        let model = self.select_model(request.model.as_deref())?;
        let parameters = ModelParameters {
            temperature: request.temperature.or(self.parameters.temperature),
            max_tokens: request.max_tokens.or(self.parameters.max_tokens),
            ..self.parameters.clone()
        };
        let previous = request.previous_project.as_deref().unwrap_or_default();
        let messages = prompts::build_messages(&request.prompt, Some(previous), self.strategy);

        let response = model.generate_chat_completion(&messages, Some(parameters)).await.map_err(|e| {
            error!(model_id = %model.model_id(), error = %e, "Model invocation failed");
            WeaverError::ModelInvocation(e)
        })?;

        if response.is_blank() {
            warn!(model_id = %model.model_id(), "Model returned an empty response");
            return Err(WeaverError::EmptyModelOutput);
        }

        let outcome = merge_response(previous, &response.content, self.strategy);
        info!(
            model_id = %model.model_id(),
            strategy = %self.strategy,
            blocks = outcome.ai_blocks_count,
            matched = outcome.matched,
            appended = outcome.appended,
            fallback = outcome.fallback,
            "Generated project update"
        );

        Ok(GenerateResponse::from_outcome(outcome, response.content))
    }

    /// Merges already generated output without calling the model.
    #[must_use]
    pub fn merge(&self, request: MergeRequest) -> GenerateResponse {
        let outcome = merge_response(&request.previous_project, &request.response, self.strategy);
        info!(
            strategy = %self.strategy,
            blocks = outcome.ai_blocks_count,
            matched = outcome.matched,
            appended = outcome.appended,
            "Merged supplied response"
        );
        GenerateResponse::from_outcome(outcome, request.response)
    }

    fn select_model(&self, requested: Option<&str>) -> Result<Arc<dyn Model>> {
        let Some(model_id) = requested.map(str::trim) else {
            return Ok(Arc::clone(&self.model));
        };
        if model_id == self.model.model_id() {
            return Ok(Arc::clone(&self.model));
        }

        let config = self.model_config.as_ref().ok_or_else(|| {
            WeaverError::InvalidInput(format!("model '{model_id}' cannot be selected on this server"))
        })?;
        Ok(ModelFactory::create(config.with_model_id(model_id.to_string()))?)
    }
}
