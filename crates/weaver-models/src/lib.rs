//! Model implementations for Weaver.
//!
//! This crate provides concrete implementations of the `Model` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and offline development
//! - **Claude**: Anthropic's messages API (API key required)
//! - **OpenAI**: OpenAI chat completions (API key required)

pub mod claude;
pub mod factory;
pub mod openai;
mod status;

use async_trait::async_trait;
use tracing::debug;
use weaver_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};

pub use claude::ClaudeModel;
pub use factory::{ModelConfig, ModelFactory, ModelType};
pub use openai::OpenAIModel;

/// What a [`MockModel`] answers with.
#[derive(Debug, Clone, Default)]
pub enum MockReply {
    /// Echo the prompt back, wrapped in a short preamble.
    #[default]
    Echo,
    /// Always answer with this exact text.
    Fixed(String),
    /// Always fail with a request error carrying this message.
    Fail(String),
}

/// A mock implementation of the `Model` trait for testing and offline runs.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
    reply: MockReply,
}

impl MockModel {
    /// Creates a new echoing `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id, reply: MockReply::Echo }
    }

    /// Creates a `MockModel` that always answers with `content`.
    #[must_use]
    pub fn with_reply(id: String, content: impl Into<String>) -> Self {
        Self { id, reply: MockReply::Fixed(content.into()) }
    }

    /// Creates a `MockModel` whose every call fails.
    #[must_use]
    pub fn failing(id: String, message: impl Into<String>) -> Self {
        Self { id, reply: MockReply::Fail(message.into()) }
    }

    fn respond(&self, prompt_tokens: u32, echoed: &str) -> Result<ModelResponse, ModelError> {
        let content = match &self.reply {
            MockReply::Echo => format!("Mock response from {}:\n{echoed}", self.id),
            MockReply::Fixed(text) => text.clone(),
            MockReply::Fail(message) => return Err(ModelError::RequestError(message.clone())),
        };

        let completion_tokens = count_tokens(&content);
        Ok(ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "MockModel generating text"
        );
        self.respond(count_tokens(prompt), prompt)
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum::<u32>();
        let last = messages.last().map_or("", |m| m.content.as_str());
        self.respond(prompt_tokens, last)
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
