//! Offline echo backend for checking the wiring without an API key.

use super::{LlmError, LlmService};
use crate::dm::Turn;
use async_trait::async_trait;

pub struct SampleService {
    model: String,
}

impl SampleService {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl Default for SampleService {
    fn default() -> Self {
        Self::new("sample")
    }
}

#[async_trait]
impl LlmService for SampleService {
    fn name(&self) -> &str {
        "sample"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat_completion(
        &self,
        _system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, LlmError> {
        let last = history
            .last()
            .ok_or_else(|| LlmError::Unavailable("sample backend needs at least one turn".into()))?;
        Ok(format!("(Local AI) You said: {}", last.content()))
    }

    async fn one_off(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError> {
        Ok(format!(
            "(Local AI) System was prompted {system_prompt}, user message was {user_input}"
        ))
    }

    async fn formatted_response(&self, prompt: &str) -> Result<String, LlmError> {
        Ok(format!("(Local AI) Prompt was: '{prompt}'"))
    }
}
