//! GameSession - the primary public API for DungeonMind.
//!
//! Wraps the DungeonMaster, the chat log and (optionally) the campaign
//! manager into a single interface that front ends drive.

use crate::campaign::{Campaign, CampaignError, CampaignManager, WorldData};
use crate::character::{CharacterConcept, CharacterCreator, CharacterError};
use crate::config::{
    ConfigError, ServiceFactory, SERVICE_CAMPAIGN_CREATION, SERVICE_CHARACTER_CREATION,
    SERVICE_DUNGEON_MASTER, SERVICE_LOCATION_SELECTION, SERVICE_STORY_SUMMARIZER,
};
use crate::dm::{ConversationHistory, DmError, DungeonMaster, Turn};
use crate::llm::StorySummarizer;
use crate::persist::{HistoryStore, PersistError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("DM error: {0}")]
    Dm(#[from] DmError),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Character error: {0}")]
    Character(#[from] CharacterError),

    #[error("No world data loaded - campaigns cannot be generated")]
    NoWorld,

    #[error("Character creation is not configured")]
    NoCharacters,
}

/// A player message plus the history the client holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    #[serde(default)]
    pub conversation_history: ConversationHistory,
}

impl ChatRequest {
    pub fn new(user_message: impl Into<String>, conversation_history: ConversationHistory) -> Self {
        Self {
            user_message: user_message.into(),
            conversation_history,
        }
    }

    /// The request history with the player's message as its last turn.
    pub fn full_history(&self) -> ConversationHistory {
        let mut history = self.conversation_history.clone();
        history.push(Turn::user(self.user_message.clone()));
        history
    }
}

/// The DM's reply and the (possibly compacted) history to send next time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub assistant_message: String,
    pub conversation_history: ConversationHistory,
}

/// Configuration for creating a session from a [`ServiceFactory`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend for the dungeon master and campaign services.
    pub backend: String,

    /// Backend for the story summarizer. Defaults to `backend`.
    pub summarizer_backend: Option<String>,

    /// Where the full chat log is kept.
    pub log_path: PathBuf,

    /// Seed for campaign sampling.
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            summarizer_backend: None,
            log_path: PathBuf::from("chat_log.json"),
            seed: None,
        }
    }

    pub fn with_summarizer_backend(mut self, backend: impl Into<String>) -> Self {
        self.summarizer_backend = Some(backend.into());
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A running game.
pub struct GameSession {
    dm: DungeonMaster,
    store: HistoryStore,
    campaigns: Option<CampaignManager>,
    characters: Option<CharacterCreator>,
}

impl GameSession {
    pub fn new(dm: DungeonMaster, store: HistoryStore) -> Self {
        Self {
            dm,
            store,
            campaigns: None,
            characters: None,
        }
    }

    pub fn with_campaigns(mut self, campaigns: CampaignManager) -> Self {
        self.campaigns = Some(campaigns);
        self
    }

    pub fn with_characters(mut self, characters: CharacterCreator) -> Self {
        self.characters = Some(characters);
        self
    }

    /// Build every service from configuration and open the chat log.
    pub async fn from_config(
        factory: &ServiceFactory,
        config: &SessionConfig,
        world: Option<WorldData>,
    ) -> Result<Self, SessionError> {
        let summarizer_backend = config
            .summarizer_backend
            .as_deref()
            .unwrap_or(&config.backend);

        let dm_service = factory.build(&config.backend, SERVICE_DUNGEON_MASTER)?;
        let (summary_service, summary_prompt) =
            factory.build_prompted(summarizer_backend, SERVICE_STORY_SUMMARIZER)?;
        let summarizer = StorySummarizer::new(summary_service.llm().clone(), summary_prompt);

        let dm = DungeonMaster::new(dm_service, Arc::new(summarizer))?
            .with_window(factory.config().history.window()?);
        let store = HistoryStore::load(&config.log_path).await?;
        let characters = CharacterCreator::new(
            factory.build(&config.backend, SERVICE_CHARACTER_CREATION)?,
            factory.config().character.clone(),
        );
        let mut session = Self::new(dm, store).with_characters(characters);

        if let Some(world) = world {
            let mut manager = CampaignManager::new(
                factory.build(&config.backend, SERVICE_LOCATION_SELECTION)?,
                factory.build(&config.backend, SERVICE_CAMPAIGN_CREATION)?,
                world.indexes,
                world.graph,
            )
            .with_rules(factory.config().hierarchy.rules());
            if let Some(seed) = config.seed {
                manager = manager.with_seed(seed);
            }
            session = session.with_campaigns(manager);
        }

        info!(
            backend = %config.backend,
            summarizer = summarizer_backend,
            campaigns = session.campaigns.is_some(),
            "Game session ready"
        );
        Ok(session)
    }

    pub fn dm(&self) -> &DungeonMaster {
        &self.dm
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn has_campaigns(&self) -> bool {
        self.campaigns.is_some()
    }

    /// Handle one player message.
    ///
    /// The window manager compacts the request history before the DM
    /// replies. The uncompacted request is recorded to the chat log only
    /// once the DM has answered, so a failed turn leaves the log untouched.
    pub async fn chat(&mut self, request: ChatRequest) -> Result<ChatResponse, SessionError> {
        let history = request.full_history();
        let reply = self.dm.reply(history.clone()).await?;
        self.store.record(&history).await?;

        Ok(ChatResponse {
            assistant_message: reply.narrative,
            conversation_history: reply.history,
        })
    }

    /// Read a freeform description into a character concept.
    pub async fn create_character(
        &self,
        description: &str,
    ) -> Result<CharacterConcept, SessionError> {
        let creator = self.characters.as_ref().ok_or(SessionError::NoCharacters)?;
        let concept = creator.parse_character_from_text(description).await?;
        info!(name = %concept.name, "Character created");
        Ok(concept)
    }

    /// Start a conversation carrying `campaign` as a system turn. The chat
    /// log restarts from it.
    pub async fn begin_campaign(
        &mut self,
        campaign: &Campaign,
    ) -> Result<ConversationHistory, SessionError> {
        let history = ConversationHistory::from(vec![Turn::system(campaign.text.clone())]);
        self.store.reset(history.clone()).await?;
        info!(
            location = %campaign.location.selected_location,
            "Campaign started"
        );
        Ok(history)
    }

    /// Generate a campaign from the player's pitch and begin it.
    pub async fn start_campaign(
        &mut self,
        pitch: &str,
    ) -> Result<(Campaign, ConversationHistory), SessionError> {
        let manager = self.campaigns.as_mut().ok_or(SessionError::NoWorld)?;
        let campaign = manager.generate_campaign(pitch).await?;
        let history = self.begin_campaign(&campaign).await?;
        Ok((campaign, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Service;
    use crate::character::CharacterOptions;
    use crate::testing::{sample_world, MockLlm, MockReply};

    fn session(dir: &tempfile::TempDir, dm_llm: &Arc<MockLlm>) -> GameSession {
        let dm = DungeonMaster::new(
            Service::new(dm_llm.clone(), Some("You are the DM".to_string())),
            Arc::new(MockLlm::default()),
        )
        .unwrap();
        GameSession::new(dm, HistoryStore::in_memory(dir.path().join("chat.json")))
    }

    #[test]
    fn test_full_history_appends_user_turn() {
        let request = ChatRequest::new(
            "I draw my sword",
            ConversationHistory::from(vec![Turn::assistant("A goblin appears.")]),
        );
        assert_eq!(
            request.full_history().turns(),
            &[Turn::assistant("A goblin appears."), Turn::user("I draw my sword")]
        );
    }

    #[test]
    fn test_chat_request_json_without_history() {
        let request: ChatRequest = serde_json::from_str(r#"{"user_message": "hi"}"#).unwrap();
        assert!(request.conversation_history.is_empty());
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::with_texts(["You enter the tavern."]));
        let mut session = session(&dir, &llm);

        let response = session
            .chat(ChatRequest::new("I enter", ConversationHistory::new()))
            .await
            .unwrap();

        assert_eq!(response.assistant_message, "You enter the tavern.");
        assert_eq!(response.conversation_history.len(), 2);
        assert_eq!(session.store().log().turns(), &[Turn::user("I enter")]);
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::new(vec![
            MockReply::text("You enter the tavern."),
            MockReply::fail("backend down"),
            MockReply::text("The barkeep nods."),
        ]));
        let mut session = session(&dir, &llm);

        let first = session
            .chat(ChatRequest::new("I enter", ConversationHistory::new()))
            .await
            .unwrap();
        let kept = first.conversation_history;

        let failed = session.chat(ChatRequest::new("I order ale", kept.clone())).await;
        assert!(matches!(failed, Err(SessionError::Dm(_))));
        assert_eq!(session.store().log().turns(), &[Turn::user("I enter")]);

        // The client retries from the history it still holds.
        session
            .chat(ChatRequest::new("I wave at the barkeep", kept))
            .await
            .unwrap();
        assert_eq!(
            session.store().log().turns(),
            &[
                Turn::user("I enter"),
                Turn::assistant("You enter the tavern."),
                Turn::user("I wave at the barkeep"),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_character() {
        let dir = tempfile::tempdir().unwrap();
        let dm_llm = Arc::new(MockLlm::default());
        let character_llm = Arc::new(MockLlm::with_texts([
            r#"{"name": "Mira", "race": "Halfling", "class": "Rogue", "background": "Criminal"}"#,
        ]));
        let creator = CharacterCreator::new(
            Service::new(character_llm.clone(), Some("Reply with JSON".to_string())),
            CharacterOptions::default(),
        );
        let session = session(&dir, &dm_llm).with_characters(creator);

        let concept = session
            .create_character("a halfling pickpocket called Mira")
            .await
            .unwrap();

        assert_eq!(concept.name, "Mira");
        assert_eq!(concept.race, "Halfling");
        assert_eq!(dm_llm.call_count(), 0);
        assert!(session.store().log().is_empty());
    }

    #[tokio::test]
    async fn test_create_character_without_creator() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::default());
        let session = session(&dir, &llm);

        let result = session.create_character("a dwarf").await;
        assert!(matches!(result, Err(SessionError::NoCharacters)));
    }

    #[tokio::test]
    async fn test_start_campaign_without_world() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::default());
        let mut session = session(&dir, &llm);

        let result = session.start_campaign("a heist").await;
        assert!(matches!(result, Err(SessionError::NoWorld)));
    }

    #[tokio::test]
    async fn test_start_campaign_seeds_system_turn() {
        let dir = tempfile::tempdir().unwrap();
        let dm_llm = Arc::new(MockLlm::default());
        let campaign_llm = Arc::new(MockLlm::with_texts([
            "Phandalin",
            "A rebuilt frontier town.",
            "Goblins raid Phandalin.",
        ]));
        let (graph, indexes) = sample_world();
        let manager = CampaignManager::new(
            Service::new(campaign_llm.clone(), Some("{location_list}".to_string())),
            Service::new(campaign_llm.clone(), Some("{selected_location}".to_string())),
            indexes,
            Arc::new(graph),
        )
        .with_seed(3);
        let mut session = session(&dir, &dm_llm).with_campaigns(manager);

        let (campaign, history) = session.start_campaign("frontier town").await.unwrap();

        assert_eq!(campaign.text, "Goblins raid Phandalin.");
        assert_eq!(history.turns(), &[Turn::system("Goblins raid Phandalin.")]);
        assert_eq!(session.store().log(), &history);
    }
}
