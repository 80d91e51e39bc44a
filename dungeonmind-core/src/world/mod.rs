//! The Forgotten Realms knowledge graph and location hierarchies.

mod graph;
mod hierarchy;

pub use graph::{GraphError, GraphStore, WorldGraph};
pub use hierarchy::{resolve, wiki_title, wiki_url, HierarchyRules, DEFAULT_MAX_DEPTH};
