//! Backend selection.

use super::{AnthropicService, LlmError, LlmService, OpenAiService, SampleService};
use crate::dm::Turn;
use async_trait::async_trait;

/// The backend chosen for a service at startup.
pub enum Backend {
    Anthropic(AnthropicService),
    OpenAi(OpenAiService),
    Sample(SampleService),
}

impl Backend {
    fn service(&self) -> &dyn LlmService {
        match self {
            Backend::Anthropic(service) => service,
            Backend::OpenAi(service) => service,
            Backend::Sample(service) => service,
        }
    }
}

impl From<AnthropicService> for Backend {
    fn from(service: AnthropicService) -> Self {
        Backend::Anthropic(service)
    }
}

impl From<OpenAiService> for Backend {
    fn from(service: OpenAiService) -> Self {
        Backend::OpenAi(service)
    }
}

impl From<SampleService> for Backend {
    fn from(service: SampleService) -> Self {
        Backend::Sample(service)
    }
}

#[async_trait]
impl LlmService for Backend {
    fn name(&self) -> &str {
        self.service().name()
    }

    fn model(&self) -> &str {
        self.service().model()
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, LlmError> {
        self.service().chat_completion(system_prompt, history).await
    }

    async fn one_off(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError> {
        self.service().one_off(system_prompt, user_input).await
    }

    async fn formatted_response(&self, prompt: &str) -> Result<String, LlmError> {
        self.service().formatted_response(prompt).await
    }
}
