//! Location hierarchy resolution.
//!
//! Given a specific place, climb the knowledge graph to the regions or
//! countries containing it, then to its continent, and report the chain
//! broadest first. Used to frame campaign narration ("Faerun > Sword Coast >
//! Phandalin").

use super::graph::GraphStore;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Upper bound on the number of ancestors collected for one place.
pub const DEFAULT_MAX_DEPTH: usize = 64;

const WIKI_BASE: &str = "https://forgottenrealms.fandom.com/wiki/";

/// Graph identifier for a wiki page title.
pub fn wiki_url(title: &str) -> String {
    format!("{WIKI_BASE}{}", title.trim().replace(' ', "_"))
}

/// Page title for a graph identifier. Identifiers that are not wiki URLs
/// are returned as-is.
pub fn wiki_title(id: &str) -> String {
    match id.strip_prefix(WIKI_BASE) {
        Some(page) => page.replace('_', " "),
        None => id.to_string(),
    }
}

/// Which categories count at each stage of the climb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRules {
    local_categories: Vec<String>,
    broad_categories: Vec<String>,
    max_depth: usize,
}

impl Default for HierarchyRules {
    fn default() -> Self {
        Self {
            local_categories: vec!["Region".to_string(), "Country".to_string()],
            broad_categories: vec!["Continent".to_string()],
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HierarchyRules {
    pub fn new(
        local_categories: Vec<String>,
        broad_categories: Vec<String>,
        max_depth: usize,
    ) -> Self {
        Self {
            local_categories,
            broad_categories,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Ancestor chain of `node`, broadest first, `node` itself excluded.
    ///
    /// The climb first follows parents tagged with a local category (region,
    /// country) as far as it goes, then continues through parents tagged with
    /// a broad category (continent). At each step the first qualifying parent
    /// in the store's predecessor order wins; nothing is re-sorted, so ties
    /// are decided by the store and are stable for a given graph.
    ///
    /// An unknown node yields an empty chain. Revisiting a node or reaching
    /// `max_depth` ends the climb with a warning instead of looping.
    pub fn resolve<G>(&self, graph: &G, node: &str) -> Vec<String>
    where
        G: GraphStore + ?Sized,
    {
        if !graph.contains(node) {
            debug!(node, "Location not in knowledge graph");
            return Vec::new();
        }

        let mut visited: HashSet<String> = HashSet::from([node.to_string()]);
        let mut chain: Vec<String> = Vec::new();
        let mut current = node.to_string();

        'stages: for qualifying in [&self.local_categories, &self.broad_categories] {
            while let Some(parent) = first_qualifying_parent(graph, &current, qualifying) {
                if chain.len() >= self.max_depth {
                    warn!(
                        node,
                        max_depth = self.max_depth,
                        "Location hierarchy exceeded maximum depth"
                    );
                    break 'stages;
                }
                if !visited.insert(parent.clone()) {
                    warn!(node, parent = %parent, "Cycle in location hierarchy");
                    break;
                }
                chain.push(parent.clone());
                current = parent;
            }
        }

        chain.reverse();
        chain
    }
}

fn first_qualifying_parent<G>(graph: &G, node: &str, qualifying: &[String]) -> Option<String>
where
    G: GraphStore + ?Sized,
{
    graph
        .predecessors(node)
        .into_iter()
        .find(|parent| {
            graph
                .categories_of(parent)
                .is_some_and(|categories| qualifying.iter().any(|q| categories.contains(q)))
        })
        .map(str::to_string)
}

/// [`HierarchyRules::resolve`] with the default rules.
pub fn resolve<G>(graph: &G, node: &str) -> Vec<String>
where
    G: GraphStore + ?Sized,
{
    HierarchyRules::default().resolve(graph, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldGraph;

    fn three_level() -> WorldGraph {
        let mut graph = WorldGraph::new();
        graph.add_node("Continent", ["Continent"]);
        graph.add_node("Region", ["Region"]);
        graph.add_node("Settlement", ["Settlement"]);
        graph.add_edge("Continent", "Region");
        graph.add_edge("Region", "Settlement");
        graph
    }

    #[test]
    fn test_absent_node_is_empty() {
        let graph = three_level();
        assert!(resolve(&graph, "X").is_empty());
    }

    #[test]
    fn test_three_level_chain() {
        let graph = three_level();
        assert_eq!(resolve(&graph, "Settlement"), vec!["Continent", "Region"]);
    }

    #[test]
    fn test_no_qualifying_ancestors() {
        let mut graph = WorldGraph::new();
        graph.add_node("Tavern", ["Buildings"]);
        graph.add_node("Street", ["Roads"]);
        graph.add_edge("Street", "Tavern");
        assert!(resolve(&graph, "Tavern").is_empty());
        assert!(resolve(&graph, "Street").is_empty());
    }

    #[test]
    fn test_membership_not_equality() {
        let mut graph = WorldGraph::new();
        graph.add_node("Dalelands", ["Settlement", "Region"]);
        graph.add_edge("Dalelands", "Shadowdale");
        assert_eq!(resolve(&graph, "Shadowdale"), vec!["Dalelands"]);
    }

    #[test]
    fn test_first_enumerated_candidate_wins() {
        let mut graph = WorldGraph::new();
        graph.add_node("Amn", ["Country"]);
        graph.add_node("Tethyr", ["Country"]);
        graph.add_node("Faerun", ["Continent"]);
        graph.add_edge("Tethyr", "Border Keep");
        graph.add_edge("Amn", "Border Keep");
        graph.add_edge("Faerun", "Amn");
        graph.add_edge("Faerun", "Tethyr");

        assert_eq!(graph.predecessors("Border Keep"), vec!["Tethyr", "Amn"]);
        assert_eq!(resolve(&graph, "Border Keep"), vec!["Faerun", "Tethyr"]);
    }

    #[test]
    fn test_non_qualifying_parents_are_skipped() {
        let mut graph = WorldGraph::new();
        graph.add_node("Inhabitants of Neverwinter", ["Inhabitants"]);
        graph.add_node("Sword Coast North", ["Region"]);
        graph.add_node("Faerun", ["Continent"]);
        graph.add_edge("Inhabitants of Neverwinter", "Neverwinter");
        graph.add_edge("Sword Coast North", "Neverwinter");
        graph.add_edge("Faerun", "Sword Coast North");

        assert_eq!(
            resolve(&graph, "Neverwinter"),
            vec!["Faerun", "Sword Coast North"]
        );
    }

    #[test]
    fn test_local_stage_climbs_several_levels() {
        let mut graph = WorldGraph::new();
        graph.add_node("Faerun", ["Continent"]);
        graph.add_node("Western Heartlands", ["Region"]);
        graph.add_node("Sword Coast", ["Region"]);
        graph.add_node("Cormyr", ["Country"]);
        graph.add_edge("Faerun", "Western Heartlands");
        graph.add_edge("Western Heartlands", "Sword Coast");
        graph.add_edge("Sword Coast", "Cormyr");
        graph.add_edge("Cormyr", "Suzail");

        assert_eq!(
            resolve(&graph, "Suzail"),
            vec!["Faerun", "Western Heartlands", "Sword Coast", "Cormyr"]
        );
    }

    #[test]
    fn test_continent_stage_does_not_return_to_regions() {
        let mut graph = WorldGraph::new();
        graph.add_node("Abeir-Toril", ["Region"]);
        graph.add_node("Faerun", ["Continent"]);
        graph.add_node("Sword Coast", ["Region"]);
        graph.add_edge("Abeir-Toril", "Faerun");
        graph.add_edge("Faerun", "Sword Coast");
        graph.add_edge("Sword Coast", "Waterdeep");

        assert_eq!(resolve(&graph, "Waterdeep"), vec!["Faerun", "Sword Coast"]);
    }

    #[test]
    fn test_cycle_is_cut() {
        let mut graph = WorldGraph::new();
        graph.add_node("North", ["Region"]);
        graph.add_node("South", ["Region"]);
        graph.add_edge("North", "Town");
        graph.add_edge("South", "North");
        graph.add_edge("North", "South");

        assert_eq!(resolve(&graph, "Town"), vec!["South", "North"]);
    }

    #[test]
    fn test_self_loop_is_cut() {
        let mut graph = WorldGraph::new();
        graph.add_node("Loop", ["Continent"]);
        graph.add_edge("Loop", "Loop");
        assert!(resolve(&graph, "Loop").is_empty());
    }

    #[test]
    fn test_max_depth() {
        let mut graph = WorldGraph::new();
        for i in 0..10 {
            graph.add_node(format!("r{i}"), ["Region"]);
            let child = if i == 0 { "start".to_string() } else { format!("r{}", i - 1) };
            graph.add_edge(&format!("r{i}"), &child);
        }
        graph.add_node("Faerun", ["Continent"]);
        graph.add_edge("Faerun", "r9");

        let rules = HierarchyRules::new(vec!["Region".into()], vec!["Continent".into()], 3);
        assert_eq!(rules.resolve(&graph, "start"), vec!["r2", "r1", "r0"]);
        assert_eq!(HierarchyRules::default().resolve(&graph, "start").len(), 11);
    }

    #[test]
    fn test_custom_categories() {
        let mut graph = WorldGraph::new();
        graph.add_node("Sword Coast", ["Regions"]);
        graph.add_node("Faerun", ["Continents"]);
        graph.add_edge("Faerun", "Sword Coast");
        graph.add_edge("Sword Coast", "Baldur's Gate");

        let rules = HierarchyRules::new(
            vec!["Regions".into(), "Countries".into()],
            vec!["Continents".into()],
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(
            rules.resolve(&graph, "Baldur's Gate"),
            vec!["Faerun", "Sword Coast"]
        );
        assert!(resolve(&graph, "Baldur's Gate").is_empty());
    }

    #[test]
    fn test_resolve_through_trait_object() {
        let graph = three_level();
        let store: &dyn GraphStore = &graph;
        assert_eq!(resolve(store, "Settlement"), vec!["Continent", "Region"]);
    }

    #[test]
    fn test_wiki_url() {
        assert_eq!(
            wiki_url("Baldur's Gate"),
            "https://forgottenrealms.fandom.com/wiki/Baldur's_Gate"
        );
        assert_eq!(wiki_url(" Neverwinter "), "https://forgottenrealms.fandom.com/wiki/Neverwinter");
    }

    #[test]
    fn test_wiki_title() {
        assert_eq!(wiki_title(&wiki_url("Sword Coast")), "Sword Coast");
        assert_eq!(wiki_title("Faerun"), "Faerun");
    }
}
