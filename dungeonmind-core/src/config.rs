//! YAML configuration: LLM backends, per-service prompts, and the tuning
//! knobs of the history window and hierarchy resolver.
//!
//! ```yaml
//! backends:
//!   claude: { provider: anthropic, model: claude-sonnet-4-20250514, temperature: 0.7 }
//!   gpt-4: { provider: openai, model: gpt-4, temperature: 0.7 }
//!   samplev1: { provider: sample }
//! services:
//!   dungeon-master: { initial_prompt: "You are the DM..." }
//! history: { trigger_threshold: 16, retain_recent: 4 }
//! ```

use crate::character::CharacterOptions;
use crate::dm::{HistoryWindow, WindowError, DEFAULT_RETAIN_RECENT, DEFAULT_TRIGGER_THRESHOLD};
use crate::llm::{
    AnthropicService, Backend, LlmError, OpenAiService, SampleService, Service,
};
use crate::prompts;
use crate::world::{HierarchyRules, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

pub const SERVICE_DUNGEON_MASTER: &str = "dungeon-master";
pub const SERVICE_STORY_SUMMARIZER: &str = "story-summarizer";
pub const SERVICE_LOCATION_SELECTION: &str = "location-selection";
pub const SERVICE_CAMPAIGN_CREATION: &str = "campaign-creation";
pub const SERVICE_CHARACTER_CREATION: &str = "character-creation";

/// Errors from loading configuration or building services from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported backend: {0}")]
    UnknownBackend(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Missing initial prompt for service {0}")]
    MissingPrompt(String),

    #[error("Failed to initialize backend {name}: {source}")]
    Backend {
        name: String,
        #[source]
        source: LlmError,
    },

    #[error("Invalid history window: {0}")]
    Window(#[from] WindowError),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DungeonMindConfig {
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    #[serde(default)]
    pub character: CharacterOptions,
}

/// How to reach one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum BackendConfig {
    Anthropic {
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<usize>,
        #[serde(default = "default_anthropic_key_env")]
        api_key_env: String,
        #[serde(default)]
        api_base: Option<String>,
    },
    #[serde(rename = "openai")]
    OpenAi {
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default)]
        api_base: Option<String>,
    },
    Sample {
        #[serde(default = "default_sample_model")]
        model: String,
    },
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_sample_model() -> String {
    "sample".to_string()
}

impl BackendConfig {
    /// Construct the backend. Fails if its API key is not available.
    pub fn build(&self) -> Result<Backend, LlmError> {
        match self {
            BackendConfig::Anthropic {
                model,
                temperature,
                max_tokens,
                api_key_env,
                api_base,
            } => {
                let mut client = claude::Claude::from_env_var(api_key_env).map_err(|e| match e {
                    claude::Error::NoApiKey => LlmError::MissingApiKey(api_key_env.clone()),
                    other => LlmError::Claude(other),
                })?;
                if let Some(model) = model {
                    client = client.with_model(model);
                }
                if let Some(api_base) = api_base {
                    client = client.with_api_base(api_base);
                }
                let mut service = AnthropicService::new(client);
                if let Some(temperature) = temperature {
                    service = service.with_temperature(*temperature);
                }
                if let Some(max_tokens) = max_tokens {
                    service = service.with_max_tokens(*max_tokens);
                }
                Ok(service.into())
            }
            BackendConfig::OpenAi {
                model,
                temperature,
                api_key_env,
                api_base,
            } => {
                let mut service = OpenAiService::from_env_var(api_key_env, model)?;
                if let Some(temperature) = temperature {
                    service = service.with_temperature(*temperature);
                }
                if let Some(api_base) = api_base {
                    service = service.with_api_base(api_base);
                }
                Ok(service.into())
            }
            BackendConfig::Sample { model } => Ok(SampleService::new(model).into()),
        }
    }
}

/// Per-service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub initial_prompt: Option<String>,
}

/// History window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: usize,
    #[serde(default = "default_retain_recent")]
    pub retain_recent: usize,
}

fn default_trigger_threshold() -> usize {
    DEFAULT_TRIGGER_THRESHOLD
}

fn default_retain_recent() -> usize {
    DEFAULT_RETAIN_RECENT
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            retain_recent: DEFAULT_RETAIN_RECENT,
        }
    }
}

impl HistoryConfig {
    pub fn window(&self) -> Result<HistoryWindow, ConfigError> {
        Ok(HistoryWindow::new(
            self.trigger_threshold,
            self.retain_recent,
        )?)
    }
}

/// Hierarchy resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default = "default_local_categories")]
    pub local_categories: Vec<String>,
    #[serde(default = "default_broad_categories")]
    pub broad_categories: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_local_categories() -> Vec<String> {
    vec!["Region".to_string(), "Country".to_string()]
}

fn default_broad_categories() -> Vec<String> {
    vec!["Continent".to_string()]
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            local_categories: default_local_categories(),
            broad_categories: default_broad_categories(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HierarchyConfig {
    pub fn rules(&self) -> HierarchyRules {
        HierarchyRules::new(
            self.local_categories.clone(),
            self.broad_categories.clone(),
            self.max_depth,
        )
    }
}

impl DungeonMindConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Configured prompt for a service, falling back to the built-in one
    /// for the well-known service names.
    pub fn initial_prompt(&self, service: &str) -> Option<String> {
        self.services
            .get(service)
            .and_then(|s| s.initial_prompt.clone())
            .or_else(|| default_prompt(service).map(str::to_string))
    }
}

fn default_prompt(service: &str) -> Option<&'static str> {
    match service {
        SERVICE_DUNGEON_MASTER => Some(prompts::DUNGEON_MASTER),
        SERVICE_STORY_SUMMARIZER => Some(prompts::STORY_SUMMARIZER),
        SERVICE_LOCATION_SELECTION => Some(prompts::LOCATION_SELECTION),
        SERVICE_CAMPAIGN_CREATION => Some(prompts::CAMPAIGN_CREATION),
        SERVICE_CHARACTER_CREATION => Some(prompts::CHARACTER_CREATION),
        _ => None,
    }
}

/// Builds [`Service`]s from a backend name and a service name.
#[derive(Debug, Clone)]
pub struct ServiceFactory {
    config: DungeonMindConfig,
}

impl ServiceFactory {
    pub fn new(config: DungeonMindConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DungeonMindConfig {
        &self.config
    }

    /// Build the backend `backend` configured for `service`.
    ///
    /// Service names must be configured or be one of the built-in ones.
    pub fn build(&self, backend: &str, service: &str) -> Result<Service, ConfigError> {
        let backend_config = self
            .config
            .backends
            .get(backend)
            .ok_or_else(|| ConfigError::UnknownBackend(backend.to_string()))?;

        if !self.config.services.contains_key(service) && default_prompt(service).is_none() {
            return Err(ConfigError::UnknownService(service.to_string()));
        }

        let llm = backend_config
            .build()
            .map_err(|source| ConfigError::Backend {
                name: backend.to_string(),
                source,
            })?;

        Ok(Service::new(Arc::new(llm), self.config.initial_prompt(service)))
    }

    /// Like [`build`](Self::build) but also requires an initial prompt.
    pub fn build_prompted(&self, backend: &str, service: &str) -> Result<(Service, String), ConfigError> {
        let built = self.build(backend, service)?;
        let prompt = built
            .initial_prompt()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingPrompt(service.to_string()))?;
        Ok((built, prompt))
    }
}
