//! Chat log persistence.
//!
//! The full, never-summarized conversation is kept on disk as JSON so a game
//! can be reviewed or resumed. The history window works on the request
//! history, not on this log.

use crate::dm::{ConversationHistory, Turn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current chat log file version.
const LOG_VERSION: u32 = 1;

/// Turns of a request appended to an existing log: the DM's previous reply
/// and the new player message.
const APPENDED_TURNS: usize = 2;

#[derive(Debug, Serialize, Deserialize)]
struct SavedLog {
    version: u32,
    turns: ConversationHistory,
}

/// A chat log bound to a file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    log: ConversationHistory,
}

impl HistoryStore {
    /// Open the log at `path`. A missing file starts an empty log.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        if !fs::try_exists(&path).await? {
            debug!(path = %path.display(), "No chat log yet, starting empty");
            return Ok(Self {
                path,
                log: ConversationHistory::new(),
            });
        }

        let content = fs::read_to_string(&path).await?;
        let saved: SavedLog = serde_json::from_str(&content)?;
        if saved.version != LOG_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: LOG_VERSION,
                found: saved.version,
            });
        }

        info!(path = %path.display(), turns = saved.turns.len(), "Loaded chat log");
        Ok(Self {
            path,
            log: saved.turns,
        })
    }

    /// A log that lives only in memory until `save` is called.
    pub fn in_memory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            log: ConversationHistory::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self) -> &ConversationHistory {
        &self.log
    }

    /// Write the log as pretty JSON, creating parent directories as needed.
    pub async fn save(&self) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let saved = SavedLog {
            version: LOG_VERSION,
            turns: self.log.clone(),
        };
        let content = serde_json::to_string_pretty(&saved)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Fold a chat request into the log and save it.
    ///
    /// An empty log takes the whole request history. Otherwise only the
    /// request's last two turns are new and get appended.
    pub async fn record(
        &mut self,
        request_history: &ConversationHistory,
    ) -> Result<&ConversationHistory, PersistError> {
        let new_turns: Vec<Turn> = if self.log.is_empty() {
            request_history.turns().to_vec()
        } else {
            request_history.tail(APPENDED_TURNS).to_vec()
        };
        debug!(appended = new_turns.len(), "Recording chat turns");
        self.log.extend(new_turns);
        self.save().await?;
        Ok(&self.log)
    }

    /// Replace the log, e.g. when a new campaign starts.
    pub async fn reset(&mut self, history: ConversationHistory) -> Result<(), PersistError> {
        self.log = history;
        self.save().await
    }
}
