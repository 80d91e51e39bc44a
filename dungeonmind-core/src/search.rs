//! Similarity search over world documents.
//!
//! Campaign setup only needs "the k documents closest to this text". The
//! [`SimilaritySearch`] trait is that contract; [`KeywordIndex`] is a small
//! in-memory implementation that ranks by shared words.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Errors from a search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Failed to read index {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid index document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Search backend error: {0}")]
    Backend(String),
}

/// A wiki page (or excerpt) returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: Option<String>,
    pub page_content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, page_content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            page_content: page_content.into(),
        }
    }

    pub fn title_or_unknown(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }
}

/// Nearest-document lookup.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Up to `k` documents, most similar first.
    async fn similarity_search(&self, query: &str, k: usize)
        -> Result<Vec<Document>, SearchError>;
}

/// In-memory index ranking documents by how many distinct query words they
/// contain. Like a vector store it always returns up to `k` results; equal
/// scores keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    documents: Vec<Document>,
    terms: Vec<HashSet<String>>,
}

impl KeywordIndex {
    pub fn new(documents: Vec<Document>) -> Self {
        let terms = documents
            .iter()
            .map(|doc| {
                let mut words = tokenize(&doc.page_content);
                if let Some(title) = &doc.title {
                    words.extend(tokenize(title));
                }
                words
            })
            .collect();
        Self { documents, terms }
    }

    /// Parse a JSON array of documents.
    pub fn from_json_str(json: &str) -> Result<Self, SearchError> {
        let documents: Vec<Document> = serde_json::from_str(json)?;
        Ok(Self::new(documents))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| SearchError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&content)
    }

    /// Load the index, or start empty when the file is missing.
    pub async fn load_or_empty(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        if !fs::try_exists(path).await.unwrap_or(false) {
            warn!(path = %path.display(), "Search index not found, using an empty one");
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SimilaritySearch for KeywordIndex {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>, SearchError> {
        let query_terms = tokenize(query);
        let mut scored: Vec<(usize, usize)> = self
            .terms
            .iter()
            .enumerate()
            .map(|(idx, terms)| (idx, query_terms.intersection(terms).count()))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(idx, _)| self.documents[idx].clone())
            .collect())
    }
}
