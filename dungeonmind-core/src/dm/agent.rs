//! The AI Dungeon Master.
//!
//! Each reply keeps the conversation inside the history window first, then
//! asks the dungeon-master service to continue it.

use super::history::{ConversationHistory, Turn};
use super::window::{HistoryWindow, Summarizer, WindowError};
use crate::llm::{LlmError, Service};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from the DM agent.
#[derive(Debug, Error)]
pub enum DmError {
    #[error("History management failed: {0}")]
    Window(#[from] WindowError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("The dungeon master service has no initial prompt")]
    MissingPrompt,
}

/// A reply plus the history it was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmReply {
    /// The DM's narration.
    pub narrative: String,
    /// The managed history, ending with the DM's turn.
    pub history: ConversationHistory,
}

/// Narrates the game through an LLM service, summarizing old turns as the
/// conversation grows.
pub struct DungeonMaster {
    service: Service,
    summarizer: Arc<dyn Summarizer>,
    window: HistoryWindow,
}

impl DungeonMaster {
    /// Fails when the service has no system prompt to narrate with.
    pub fn new(service: Service, summarizer: Arc<dyn Summarizer>) -> Result<Self, DmError> {
        if service.initial_prompt().is_none() {
            return Err(DmError::MissingPrompt);
        }
        Ok(Self {
            service,
            summarizer,
            window: HistoryWindow::default(),
        })
    }

    pub fn with_window(mut self, window: HistoryWindow) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Compact `history` if needed, then generate the next DM turn.
    pub async fn reply(&self, history: ConversationHistory) -> Result<DmReply, DmError> {
        let mut managed = self.window.manage(history, self.summarizer.as_ref()).await?;

        let system_prompt = self.service.initial_prompt().unwrap_or_default();
        debug!(
            turns = managed.len(),
            backend = self.service.llm().name(),
            "Requesting DM reply"
        );
        let narrative = self
            .service
            .llm()
            .chat_completion(system_prompt, managed.turns())
            .await?;

        managed.push(Turn::assistant(narrative.clone()));
        Ok(DmReply {
            narrative,
            history: managed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dialogue, MockCall, MockLlm};

    fn dm(llm: &Arc<MockLlm>, summarizer: &Arc<MockLlm>) -> DungeonMaster {
        DungeonMaster::new(
            Service::new(llm.clone(), Some("You are the DM".to_string())),
            summarizer.clone(),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_prompt() {
        let llm = Arc::new(MockLlm::default());
        let result = DungeonMaster::new(Service::new(llm.clone(), None), llm);
        assert!(matches!(result, Err(DmError::MissingPrompt)));
    }

    #[tokio::test]
    async fn test_reply_short_history() {
        let llm = Arc::new(MockLlm::with_texts(["The door creaks open."]));
        let summarizer = Arc::new(MockLlm::default());
        let history = ConversationHistory::from(vec![Turn::user("I open the door")]);

        let reply = dm(&llm, &summarizer).reply(history).await.unwrap();

        assert_eq!(reply.narrative, "The door creaks open.");
        assert_eq!(
            reply.history.turns(),
            &[
                Turn::user("I open the door"),
                Turn::assistant("The door creaks open.")
            ]
        );
        assert_eq!(summarizer.call_count(), 0);
        assert_eq!(
            llm.calls()[0],
            MockCall::Chat {
                system_prompt: "You are the DM".to_string(),
                history: vec![Turn::user("I open the door")],
            }
        );
    }

    #[tokio::test]
    async fn test_reply_uses_managed_history() {
        let llm = Arc::new(MockLlm::with_texts(["Onward."]));
        let summarizer = Arc::new(MockLlm::with_texts(["Earlier, things happened."]));
        let mut turns = dialogue(16);
        turns.push(Turn::user("What now?"));

        let reply = dm(&llm, &summarizer)
            .reply(ConversationHistory::from(turns))
            .await
            .unwrap();

        let sent = &llm.chat_histories()[0];
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0], Turn::system("Earlier, things happened."));
        assert_eq!(sent[4], Turn::user("What now?"));
        assert_eq!(reply.history.len(), 6);
    }

    #[tokio::test]
    async fn test_reply_propagates_llm_failure() {
        let llm = Arc::new(MockLlm::failing("overloaded"));
        let summarizer = Arc::new(MockLlm::default());

        let result = dm(&llm, &summarizer)
            .reply(ConversationHistory::from(vec![Turn::user("hi")]))
            .await;

        assert!(matches!(result, Err(DmError::Llm(LlmError::Unavailable(_)))));
    }
}
