//! Read-only knowledge graph of world locations.
//!
//! Edges point from the containing entity to the contained one, so a node's
//! predecessors are the places it belongs to.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Errors from loading a graph file.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Failed to read graph {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid graph document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read access to a directed knowledge graph.
pub trait GraphStore: Send + Sync {
    fn contains(&self, id: &str) -> bool;

    /// Direct parents of `id`, in the store's own (stable) order. Empty for
    /// unknown nodes.
    fn predecessors(&self, id: &str) -> Vec<&str>;

    fn categories_of(&self, id: &str) -> Option<&BTreeSet<String>>;
}

#[derive(Debug, Clone)]
struct GraphNode {
    id: String,
    categories: BTreeSet<String>,
    parents: Vec<usize>,
}

/// In-memory graph. Predecessors are enumerated in edge insertion order.
#[derive(Debug, Clone, Default)]
pub struct WorldGraph {
    index: HashMap<String, usize>,
    nodes: Vec<GraphNode>,
}

impl WorldGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or replace the categories of an existing one.
    pub fn add_node<I, S>(&mut self, id: impl Into<String>, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idx = self.ensure_node(id.into());
        self.nodes[idx].categories = categories.into_iter().map(Into::into).collect();
    }

    /// Add a `parent -> child` edge. Unknown endpoints are created without
    /// categories; repeated edges are ignored.
    pub fn add_edge(&mut self, parent: &str, child: &str) {
        let parent_idx = self.ensure_node(parent.to_string());
        let child_idx = self.ensure_node(child.to_string());
        let parents = &mut self.nodes[child_idx].parents;
        if !parents.contains(&parent_idx) {
            parents.push(parent_idx);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.parents.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn ensure_node(&mut self, id: String) -> usize {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.index.insert(id.clone(), idx);
        self.nodes.push(GraphNode {
            id,
            categories: BTreeSet::new(),
            parents: Vec::new(),
        });
        idx
    }

    fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Parse a node-link JSON document:
    /// `{"nodes": [{"id", "categories"}], "links": [{"source", "target"}]}`.
    ///
    /// `categories` may be a list or a single comma-separated string.
    pub fn from_json_str(json: &str) -> Result<Self, GraphError> {
        let document: NodeLinkDocument = serde_json::from_str(json)?;
        let mut graph = Self::new();
        for node in document.nodes {
            graph.add_node(node.id, node.categories.into_set());
        }
        for link in document.links {
            graph.add_edge(&link.source, &link.target);
        }
        Ok(graph)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| GraphError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let graph = Self::from_json_str(&content)?;
        info!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded knowledge graph"
        );
        Ok(graph)
    }

    /// Load the graph, or start with an empty one when the file is missing.
    pub async fn load_or_empty(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        if !fs::try_exists(path).await.unwrap_or(false) {
            warn!(path = %path.display(), "Knowledge graph not found. Location hierarchies will be empty.");
            return Ok(Self::new());
        }
        Self::load(path).await
    }
}

impl GraphStore for WorldGraph {
    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn predecessors(&self, id: &str) -> Vec<&str> {
        self.node(id)
            .map(|node| {
                node.parents
                    .iter()
                    .map(|&idx| self.nodes[idx].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn categories_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.node(id).map(|node| &node.categories)
    }
}

#[derive(Debug, Deserialize)]
struct NodeLinkDocument {
    nodes: Vec<NodeRecord>,
    #[serde(default, alias = "edges")]
    links: Vec<LinkRecord>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    #[serde(default)]
    categories: Categories,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Categories {
    List(Vec<String>),
    Joined(String),
}

impl Default for Categories {
    fn default() -> Self {
        Categories::List(Vec::new())
    }
}

impl Categories {
    fn into_set(self) -> BTreeSet<String> {
        match self {
            Categories::List(list) => list.into_iter().collect(),
            Categories::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LinkRecord {
    source: String,
    target: String,
}
