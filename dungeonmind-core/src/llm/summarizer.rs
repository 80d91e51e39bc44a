//! LLM-backed story summarizer.

use super::{LlmError, LlmService};
use crate::dm::{Summarizer, Turn};
use crate::prompts;
use async_trait::async_trait;
use std::sync::Arc;

/// Summarizes older turns by filling the `{chat_log}` placeholder of a
/// prompt template and sending it as a single formatted request.
pub struct StorySummarizer {
    llm: Arc<dyn LlmService>,
    template: String,
}

impl StorySummarizer {
    pub fn new(llm: Arc<dyn LlmService>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }

    /// Use the built-in summarizer prompt.
    pub fn with_default_prompt(llm: Arc<dyn LlmService>) -> Self {
        Self::new(llm, prompts::STORY_SUMMARIZER)
    }

    pub fn build_prompt(&self, context: &[Turn]) -> String {
        let chat_log = render_chat_log(context);
        prompts::fill(&self.template, &[("chat_log", chat_log.as_str())])
    }
}

/// One `role: content` line per turn.
pub fn render_chat_log(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role(), turn.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Summarizer for StorySummarizer {
    async fn summarize(&self, context: &[Turn]) -> Result<String, LlmError> {
        let prompt = self.build_prompt(context);
        self.llm.formatted_response(&prompt).await
    }
}
