//! History window management.
//!
//! Keeps the conversation sent to the Dungeon Master bounded. Once enough
//! dialogue accumulates, everything but the latest few exchanges is folded
//! into a single summary turn. System turns are never compacted and never
//! count toward the trigger, so they can still grow without bound.

use super::history::{ConversationHistory, Turn};
use crate::llm::LlmError;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// Non-system turn count at which a summarization pass fires.
pub const DEFAULT_TRIGGER_THRESHOLD: usize = 16;

/// Number of most recent non-system turns kept verbatim.
pub const DEFAULT_RETAIN_RECENT: usize = 4;

/// Condenses a run of turns into a synopsis.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, context: &[Turn]) -> Result<String, LlmError>;
}

/// Errors from a summarization pass.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Summarization failed: {0}")]
    Summarizer(#[from] LlmError),

    #[error("Summarizer returned an empty summary")]
    EmptySummary,

    #[error(
        "retain_recent ({retain_recent}) must be smaller than trigger_threshold ({trigger_threshold})"
    )]
    InvalidWindow {
        trigger_threshold: usize,
        retain_recent: usize,
    },
}

/// Summarize-and-retain policy for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    trigger_threshold: usize,
    retain_recent: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            retain_recent: DEFAULT_RETAIN_RECENT,
        }
    }
}

impl HistoryWindow {
    /// Create a window. At least one turn must be left to summarize when a
    /// pass fires, so `retain_recent` must be below `trigger_threshold`.
    pub fn new(trigger_threshold: usize, retain_recent: usize) -> Result<Self, WindowError> {
        if retain_recent >= trigger_threshold {
            return Err(WindowError::InvalidWindow {
                trigger_threshold,
                retain_recent,
            });
        }
        Ok(Self {
            trigger_threshold,
            retain_recent,
        })
    }

    pub fn trigger_threshold(&self) -> usize {
        self.trigger_threshold
    }

    pub fn retain_recent(&self) -> usize {
        self.retain_recent
    }

    /// Whether `manage` would summarize this history.
    pub fn needs_compaction(&self, history: &ConversationHistory) -> bool {
        history.non_system_count() >= self.trigger_threshold
    }

    /// Compact `history` if it has reached the trigger threshold.
    ///
    /// Below the threshold the input is returned untouched and the
    /// summarizer is not called. Otherwise the result is every system turn
    /// (original order), then one new system turn with the summary of the
    /// older dialogue, then the last `retain_recent` non-system turns.
    /// The summarizer only ever sees the turns being folded away.
    pub async fn manage(
        &self,
        history: ConversationHistory,
        summarizer: &dyn Summarizer,
    ) -> Result<ConversationHistory, WindowError> {
        let non_system = history.non_system_count();
        if non_system < self.trigger_threshold {
            debug!(
                non_system,
                threshold = self.trigger_threshold,
                "History below summarization threshold"
            );
            return Ok(history);
        }

        let (system_turns, mut to_summarize) = history.partition_system();
        let recent = to_summarize.split_off(to_summarize.len() - self.retain_recent);

        info!(
            summarized = to_summarize.len(),
            retained = recent.len(),
            system = system_turns.len(),
            "Summarizing conversation history"
        );

        let summary = summarizer.summarize(&to_summarize).await?;
        if summary.trim().is_empty() {
            return Err(WindowError::EmptySummary);
        }

        let mut compacted = ConversationHistory::from(system_turns);
        compacted.push(Turn::system(summary));
        compacted.extend(recent);
        Ok(compacted)
    }
}
