//! Campaign generation.
//!
//! Picks a starting location that fits the player's pitch, gathers nearby
//! characters, creatures, items and lore, and asks the campaign-creation
//! service for a one-shot adventure built from them.

use crate::config::{SERVICE_CAMPAIGN_CREATION, SERVICE_LOCATION_SELECTION};
use crate::llm::{LlmError, Service};
use crate::prompts;
use crate::search::{Document, KeywordIndex, SearchError, SimilaritySearch};
use crate::world::{wiki_title, wiki_url, GraphError, GraphStore, HierarchyRules, WorldGraph};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Places retrieved for the pitch, and how many of them are offered.
const PLACE_CANDIDATES: usize = 20;
const PLACE_CHOICES: usize = 10;

/// Characters, creatures and items: retrieved, then kept.
const ELEMENT_CANDIDATES: usize = 15;
const ELEMENT_CHOICES: usize = 10;

/// History and culture snippets: retrieved, then kept.
const LORE_CANDIDATES: usize = 50;
const LORE_CHOICES: usize = 20;

/// Characters of page content shown per candidate or lore snippet.
const EXCERPT_CHARS: usize = 300;

/// Errors from campaign generation.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Knowledge graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("No suitable locations found")]
    NoLocations,

    #[error("Location selection returned {0:?}, which was not offered")]
    UnknownLocation(String),

    #[error("Missing initial prompt for service {0}")]
    MissingPrompt(&'static str),
}

/// The similarity indexes campaign setup draws from.
#[derive(Clone)]
pub struct WorldIndexes {
    pub places: Arc<dyn SimilaritySearch>,
    pub characters: Arc<dyn SimilaritySearch>,
    pub creatures: Arc<dyn SimilaritySearch>,
    pub items: Arc<dyn SimilaritySearch>,
    pub history_and_culture: Arc<dyn SimilaritySearch>,
}

/// Knowledge graph plus indexes, as loaded from a world directory.
#[derive(Clone)]
pub struct WorldData {
    pub graph: Arc<dyn GraphStore>,
    pub indexes: WorldIndexes,
}

impl WorldData {
    /// Load `graph.json` and the five index files from `dir`. Missing files
    /// load as empty.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, CampaignError> {
        let dir = dir.as_ref();
        let index = |name: &str| {
            let path = dir.join(name);
            async move {
                let index = KeywordIndex::load_or_empty(path).await?;
                Ok::<Arc<dyn SimilaritySearch>, SearchError>(Arc::new(index))
            }
        };

        let graph = WorldGraph::load_or_empty(dir.join("graph.json")).await?;
        let indexes = WorldIndexes {
            places: index("places.json").await?,
            characters: index("characters.json").await?,
            creatures: index("creatures.json").await?,
            items: index("items.json").await?,
            history_and_culture: index("history_and_culture.json").await?,
        };
        info!(dir = %dir.display(), "Loaded world data");

        Ok(Self {
            graph: Arc::new(graph),
            indexes,
        })
    }
}

/// The chosen starting location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSelection {
    pub selected_location: String,
    pub location_description: String,
    pub location_summary: String,
    /// Graph identifiers, broadest first.
    pub location_hierarchy: Vec<String>,
}

impl LocationSelection {
    /// Hierarchy as readable titles: `"Faerun > Sword Coast"`.
    pub fn hierarchy_label(&self) -> String {
        self.location_hierarchy
            .iter()
            .map(|id| wiki_title(id))
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// World material gathered around the location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignElements {
    pub selected_location: String,
    pub location_summary: String,
    pub characters: Vec<String>,
    pub creatures: Vec<String>,
    pub items: Vec<String>,
    pub cultural_facts: Vec<String>,
}

/// A generated adventure and what it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub location: LocationSelection,
    pub elements: CampaignElements,
    pub text: String,
}

/// Builds one-shot campaigns from the world indexes and knowledge graph.
pub struct CampaignManager {
    location_service: Service,
    campaign_service: Service,
    indexes: WorldIndexes,
    graph: Arc<dyn GraphStore>,
    rules: HierarchyRules,
    rng: StdRng,
}

impl CampaignManager {
    pub fn new(
        location_service: Service,
        campaign_service: Service,
        indexes: WorldIndexes,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            location_service,
            campaign_service,
            indexes,
            graph,
            rules: HierarchyRules::default(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rules(mut self, rules: HierarchyRules) -> Self {
        self.rules = rules;
        self
    }

    /// Fix the random choices (candidate sampling) for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Ancestor chain for a location title.
    pub fn location_hierarchy(&self, title: &str) -> Vec<String> {
        self.rules.resolve(self.graph.as_ref(), &wiki_url(title))
    }

    /// Choose the starting location for `user_input`.
    pub async fn select_campaign_location(
        &mut self,
        user_input: &str,
    ) -> Result<LocationSelection, CampaignError> {
        let template = self
            .location_service
            .initial_prompt()
            .ok_or(CampaignError::MissingPrompt(SERVICE_LOCATION_SELECTION))?
            .to_string();

        let retrieved = self
            .indexes
            .places
            .similarity_search(user_input, PLACE_CANDIDATES)
            .await?;
        if retrieved.is_empty() {
            return Err(CampaignError::NoLocations);
        }

        let offered = sample(&mut self.rng, &retrieved, PLACE_CHOICES);
        let location_list = offered
            .iter()
            .map(|doc| {
                format!(
                    "- {}: {}...",
                    doc.title_or_unknown(),
                    excerpt(&doc.page_content)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = prompts::fill(
            &template,
            &[
                ("location_list", location_list.as_str()),
                ("user_input", user_input),
            ],
        );
        let reply = self
            .location_service
            .llm()
            .formatted_response(&prompt)
            .await?;
        let chosen = reply.trim();

        let picked = offered
            .iter()
            .find(|doc| doc.title.as_deref() == Some(chosen))
            .or_else(|| {
                offered.iter().find(|doc| {
                    doc.title
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(chosen))
                })
            })
            .ok_or_else(|| CampaignError::UnknownLocation(chosen.to_string()))?;

        let selected_location = picked.title_or_unknown().to_string();
        let location_description = picked.page_content.clone();

        let location_summary = self
            .location_service
            .llm()
            .formatted_response(&format!(
                "{} {}",
                prompts::LOCATION_SUMMARY_PREFIX,
                location_description
            ))
            .await?;

        let location_hierarchy = self.location_hierarchy(&selected_location);
        debug!(
            location = %selected_location,
            hierarchy = ?location_hierarchy,
            "Selected campaign location"
        );

        Ok(LocationSelection {
            selected_location,
            location_description,
            location_summary,
            location_hierarchy,
        })
    }

    /// Gather characters, creatures, items and lore related to a location.
    pub async fn select_campaign_elements(
        &mut self,
        selected_location: &str,
        location_summary: &str,
    ) -> Result<CampaignElements, CampaignError> {
        let query = format!("{selected_location}: {location_summary}");

        let characters = self
            .indexes
            .characters
            .similarity_search(&query, ELEMENT_CANDIDATES)
            .await?;
        let creatures = self
            .indexes
            .creatures
            .similarity_search(&query, ELEMENT_CANDIDATES)
            .await?;
        let items = self
            .indexes
            .items
            .similarity_search(&query, ELEMENT_CANDIDATES)
            .await?;
        let lore = self
            .indexes
            .history_and_culture
            .similarity_search(&query, LORE_CANDIDATES)
            .await?;

        let titles = |docs: Vec<&Document>| -> Vec<String> {
            docs.into_iter()
                .map(|doc| doc.title_or_unknown().to_string())
                .collect()
        };

        Ok(CampaignElements {
            selected_location: selected_location.to_string(),
            location_summary: location_summary.to_string(),
            characters: titles(sample(&mut self.rng, &characters, ELEMENT_CHOICES)),
            creatures: titles(sample(&mut self.rng, &creatures, ELEMENT_CHOICES)),
            items: titles(sample(&mut self.rng, &items, ELEMENT_CHOICES)),
            cultural_facts: sample(&mut self.rng, &lore, LORE_CHOICES)
                .into_iter()
                .map(|doc| excerpt(&doc.page_content).to_string())
                .collect(),
        })
    }

    /// Generate a full one-shot campaign from the player's pitch.
    pub async fn generate_campaign(&mut self, user_input: &str) -> Result<Campaign, CampaignError> {
        let template = self
            .campaign_service
            .initial_prompt()
            .ok_or(CampaignError::MissingPrompt(SERVICE_CAMPAIGN_CREATION))?
            .to_string();

        let location = self.select_campaign_location(user_input).await?;
        let elements = self
            .select_campaign_elements(&location.selected_location, &location.location_summary)
            .await?;

        let hierarchy = location.hierarchy_label();
        let characters = elements.characters.join(", ");
        let creatures = elements.creatures.join(", ");
        let items = elements.items.join(", ");
        let cultural_facts = elements.cultural_facts.join(", ");

        let prompt = prompts::fill(
            &template,
            &[
                ("selected_location", elements.selected_location.as_str()),
                ("location_summary", elements.location_summary.as_str()),
                ("location_hierarchy", hierarchy.as_str()),
                ("characters", characters.as_str()),
                ("creatures", creatures.as_str()),
                ("items", items.as_str()),
                ("cultural_facts", cultural_facts.as_str()),
            ],
        );

        let text = self
            .campaign_service
            .llm()
            .formatted_response(&prompt)
            .await?;

        info!(
            location = %location.selected_location,
            characters = elements.characters.len(),
            creatures = elements.creatures.len(),
            items = elements.items.len(),
            facts = elements.cultural_facts.len(),
            "Generated campaign"
        );

        Ok(Campaign {
            location,
            elements,
            text,
        })
    }
}

/// Up to `amount` distinct documents in random order.
fn sample<'a>(rng: &mut StdRng, docs: &'a [Document], amount: usize) -> Vec<&'a Document> {
    docs.choose_multiple(rng, amount).collect()
}

/// The first [`EXCERPT_CHARS`] characters of `text`.
fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
