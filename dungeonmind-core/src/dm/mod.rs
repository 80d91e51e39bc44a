//! AI Dungeon Master module.
//!
//! Conversation histories, the summarizing history window, and the DM agent
//! that narrates through them.

mod agent;
pub mod history;
pub mod window;

pub use agent::{DmError, DmReply, DungeonMaster};
pub use history::{ConversationHistory, Turn, TurnRole};
pub use window::{
    HistoryWindow, Summarizer, WindowError, DEFAULT_RETAIN_RECENT, DEFAULT_TRIGGER_THRESHOLD,
};
