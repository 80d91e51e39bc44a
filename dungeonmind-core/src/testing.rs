//! Testing utilities.
//!
//! This module provides tools for deterministic tests without API calls:
//! - `MockLlm`, a scripted language model that doubles as a summarizer
//! - `sample_world` for a small graph plus search indexes
//! - Assertion helpers for conversation histories

use crate::campaign::WorldIndexes;
use crate::dm::{ConversationHistory, Summarizer, Turn, TurnRole};
use crate::llm::{LlmError, LlmService};
use crate::search::{Document, KeywordIndex};
use crate::world::{wiki_url, WorldGraph};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

const NO_MORE_REPLIES: &str = "The DM has no more scripted responses.";

/// A scripted reply from the mock model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// A call the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Chat {
        system_prompt: String,
        history: Vec<Turn>,
    },
    OneOff {
        system_prompt: String,
        user_input: String,
    },
    Formatted(String),
    Summarize(Vec<Turn>),
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    calls: Vec<MockCall>,
}

/// A language model that returns scripted replies in order and records
/// every call. Once the script runs out it answers with a fixed line.
#[derive(Debug, Default)]
pub struct MockLlm {
    state: Mutex<MockState>,
}

impl MockLlm {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            state: Mutex::new(MockState {
                replies: replies.into(),
                calls: Vec::new(),
            }),
        }
    }

    /// Script successful replies.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(MockReply::text).collect())
    }

    /// A mock whose first call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![MockReply::fail(message)])
    }

    /// Add a reply to the end of the script.
    pub fn queue(&self, reply: MockReply) {
        self.lock().replies.push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Prompts sent through `formatted_response`.
    pub fn prompts(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Formatted(prompt) => Some(prompt.clone()),
                _ => None,
            })
            .collect()
    }

    /// Histories sent through `chat_completion`.
    pub fn chat_histories(&self) -> Vec<Vec<Turn>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Chat { history, .. } => Some(history.clone()),
                _ => None,
            })
            .collect()
    }

    /// Contexts handed to the mock as a [`Summarizer`].
    pub fn summarized_contexts(&self) -> Vec<Vec<Turn>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Summarize(context) => Some(context.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn respond(&self, call: MockCall) -> Result<String, LlmError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.replies.pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(message)) => Err(LlmError::Unavailable(message)),
            None => Ok(NO_MORE_REPLIES.to_string()),
        }
    }
}

#[async_trait]
impl LlmService for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, LlmError> {
        self.respond(MockCall::Chat {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
        })
    }

    async fn one_off(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError> {
        self.respond(MockCall::OneOff {
            system_prompt: system_prompt.to_string(),
            user_input: user_input.to_string(),
        })
    }

    async fn formatted_response(&self, prompt: &str) -> Result<String, LlmError> {
        self.respond(MockCall::Formatted(prompt.to_string()))
    }
}

#[async_trait]
impl Summarizer for MockLlm {
    async fn summarize(&self, context: &[Turn]) -> Result<String, LlmError> {
        self.respond(MockCall::Summarize(context.to_vec()))
    }
}

/// Alternating player/DM dialogue of `count` turns.
pub fn dialogue(count: usize) -> Vec<Turn> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                Turn::user(format!("player {i}"))
            } else {
                Turn::assistant(format!("dm {i}"))
            }
        })
        .collect()
}

/// A tiny Sword Coast: a graph with Faerun > Sword Coast > Phandalin and
/// one-document-per-topic search indexes.
pub fn sample_world() -> (WorldGraph, WorldIndexes) {
    let mut graph = WorldGraph::new();
    graph.add_node(wiki_url("Faerun"), ["Continent"]);
    graph.add_node(wiki_url("Sword Coast"), ["Region"]);
    graph.add_node(wiki_url("Phandalin"), ["Settlement"]);
    graph.add_edge(&wiki_url("Faerun"), &wiki_url("Sword Coast"));
    graph.add_edge(&wiki_url("Sword Coast"), &wiki_url("Phandalin"));

    let index = |docs: Vec<Document>| Arc::new(KeywordIndex::new(docs));
    let indexes = WorldIndexes {
        places: index(vec![
            Document::new("Phandalin", "A frontier town built on the ruins of an older settlement."),
            Document::new("Neverwinter", "The Jewel of the North, a city of skilled artisans."),
        ]),
        characters: index(vec![Document::new("Sildar Hallwinter", "A knight of the Lords' Alliance.")]),
        creatures: index(vec![Document::new("Goblin", "Small, black-hearted humanoids.")]),
        items: index(vec![Document::new("Longsword", "A versatile martial weapon.")]),
        history_and_culture: index(vec![Document::new(
            "Lords' Alliance",
            "A coalition of rulers from cities across the north.",
        )]),
    };
    (graph, indexes)
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the history has exactly `count` turns that are not system turns.
#[track_caller]
pub fn assert_dialogue_len(history: &ConversationHistory, count: usize) {
    assert_eq!(
        history.non_system_count(),
        count,
        "Expected {count} dialogue turns, got {}",
        history.non_system_count()
    );
}

/// Assert the history ends with an assistant turn containing `text`.
#[track_caller]
pub fn assert_last_reply(history: &ConversationHistory, text: &str) {
    let Some(last) = history.last() else {
        panic!("Expected a reply, but the history is empty");
    };
    assert_eq!(last.role(), TurnRole::Assistant, "Last turn is not a reply");
    assert_eq!(last.content(), text);
}
