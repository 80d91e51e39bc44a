//! DungeonMind: an AI Dungeon Master for the Forgotten Realms.
//!
//! This crate provides:
//! - A history window that folds old dialogue into a summary turn
//! - Location hierarchy resolution over the world knowledge graph
//! - Campaign generation from similarity search over world documents
//! - Character concepts parsed from freeform player descriptions
//! - Pluggable LLM backends chosen from YAML configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use dungeonmind_core::{
//!     ChatRequest, DungeonMindConfig, GameSession, ServiceFactory, SessionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = ServiceFactory::new(DungeonMindConfig::load("dungeonmind.yaml").await?);
//!     let config = SessionConfig::new("claude");
//!     let mut session = GameSession::from_config(&factory, &config, None).await?;
//!
//!     let response = session
//!         .chat(ChatRequest::new("I look around the tavern", Default::default()))
//!         .await?;
//!     println!("{}", response.assistant_message);
//!     Ok(())
//! }
//! ```

pub mod campaign;
pub mod character;
pub mod config;
pub mod dm;
pub mod llm;
pub mod persist;
pub mod prompts;
pub mod search;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use campaign::{
    Campaign, CampaignElements, CampaignError, CampaignManager, LocationSelection, WorldData,
    WorldIndexes,
};
pub use character::{CharacterConcept, CharacterCreator, CharacterError, CharacterOptions};
pub use config::{ConfigError, DungeonMindConfig, ServiceFactory};
pub use dm::{ConversationHistory, DungeonMaster, HistoryWindow, Summarizer, Turn, TurnRole};
pub use llm::{Backend, LlmError, LlmService, Service};
pub use persist::HistoryStore;
pub use search::{Document, KeywordIndex, SimilaritySearch};
pub use session::{ChatRequest, ChatResponse, GameSession, SessionConfig, SessionError};
pub use testing::{MockLlm, MockReply};
pub use world::{GraphStore, HierarchyRules, WorldGraph};
