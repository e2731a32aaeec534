//! Claude (Anthropic) model implementation.
//!
//! Claude takes system instructions through a dedicated `system` field rather
//! than as a message, so system-role messages are lifted out of the
//! conversation before the request is built.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};
use weaver_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};

use crate::status::classify_failure;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Claude model implementation.
#[derive(Debug, Clone)]
pub struct ClaudeModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl ClaudeModel {
    /// Creates a new `ClaudeModel`, reading the key from `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not set.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "ANTHROPIC_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new `ClaudeModel` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: DEFAULT_BASE_URL.to_string(), client: Client::new() }
    }

    /// Points the model at a different messages endpoint (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Joins every system message into the single `system` field.
    fn extract_system_prompt(messages: &[ChatMessage]) -> Option<String> {
        let parts: Vec<&str> =
            messages.iter().filter(|m| m.role == "system").map(|m| m.content.as_str()).collect();
        if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
    }

    fn build_request(&self, messages: &[ChatMessage], parameters: Option<ModelParameters>) -> ClaudeRequest {
        let params = parameters.unwrap_or_default();
        ClaudeRequest {
            model: self.model_id.clone(),
            messages: messages
                .iter()
                .filter(|m| m.role != "system")
                .map(|m| ClaudeMessage {
                    role: if m.role == "assistant" { "assistant" } else { "user" }.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: Self::extract_system_prompt(messages),
            temperature: params.temperature,
            top_p: params.top_p,
            stop_sequences: params.stop_sequences,
        }
    }
}

#[async_trait]
impl Model for ClaudeModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        self.generate_chat_completion(&[ChatMessage::user(prompt)], parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "ClaudeModel generating chat completion"
        );

        let url = format!("{}/messages", self.base_url);
        let body = self.build_request(messages, parameters);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Claude API");
                ModelError::RequestError(format!("Network error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_failure("anthropic", status, text));
        }

        let parsed: ClaudeResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Claude API response");
            ModelError::SerializationError(format!("Failed to parse response: {e}"))
        })?;

        // Concatenate every text segment; tool-use and thinking segments are skipped.
        let content: String = parsed
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect();

        Ok(ModelResponse {
            content,
            model_id: Some(self.model_id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
                total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Claude API request/response structures

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_model_creation_with_api_key() {
        let model = ClaudeModel::with_api_key("claude-sonnet-4-5".to_string(), "test-key".to_string());
        assert_eq!(model.model_id(), "claude-sonnet-4-5");
    }

    #[test]
    fn test_system_prompts_joined() {
        let messages = vec![
            ChatMessage::system("Answer with code only."),
            ChatMessage::system("Use fenced blocks."),
            ChatMessage::user("Hello"),
        ];
        assert_eq!(
            ClaudeModel::extract_system_prompt(&messages).as_deref(),
            Some("Answer with code only.\n\nUse fenced blocks.")
        );
        assert_eq!(ClaudeModel::extract_system_prompt(&[ChatMessage::user("x")]), None);
    }

    #[test]
    fn test_request_filters_system_and_defaults_max_tokens() {
        let model = ClaudeModel::with_api_key("claude".to_string(), "k".to_string());
        let params = ModelParameters { temperature: Some(0.0), top_p: None, max_tokens: None, stop_sequences: None };
        let request = model.build_request(&[ChatMessage::system("s"), ChatMessage::user("u")], Some(params));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(request.system.as_deref(), Some("s"));
    }
}
