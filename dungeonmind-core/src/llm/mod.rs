//! Language model services.
//!
//! Every backend is reached through [`LlmService`]. Which backend runs is
//! decided once at startup from configuration (see [`Backend`] and
//! [`crate::config::ServiceFactory`]), never per call.

mod anthropic;
mod backend;
mod openai;
mod sample;
mod summarizer;

pub use anthropic::AnthropicService;
pub use backend::Backend;
pub use openai::OpenAiService;
pub use sample::SampleService;
pub use summarizer::StorySummarizer;

use crate::dm::Turn;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors from language model backends.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Claude API error: {0}")]
    Claude(#[from] claude::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No API key configured - set {0}")]
    MissingApiKey(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// A text-completion backend.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Continue a conversation. `system_prompt` comes first, followed by the
    /// history in order.
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, LlmError>;

    /// A single exchange that is not part of any conversation.
    async fn one_off(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError>;

    /// Send an already-filled prompt as a lone user message.
    async fn formatted_response(&self, prompt: &str) -> Result<String, LlmError>;
}

/// A backend paired with the instructions for one job (dungeon master,
/// summarizer, ...).
#[derive(Clone)]
pub struct Service {
    llm: Arc<dyn LlmService>,
    initial_prompt: Option<String>,
}

impl Service {
    pub fn new(llm: Arc<dyn LlmService>, initial_prompt: Option<String>) -> Self {
        Self {
            llm,
            initial_prompt,
        }
    }

    pub fn llm(&self) -> &Arc<dyn LlmService> {
        &self.llm
    }

    pub fn initial_prompt(&self) -> Option<&str> {
        self.initial_prompt.as_deref()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("backend", &self.llm.name())
            .field("model", &self.llm.model())
            .field("has_prompt", &self.initial_prompt.is_some())
            .finish()
    }
}
