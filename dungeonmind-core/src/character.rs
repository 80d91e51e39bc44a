//! Player character creation from freeform text.
//!
//! The character-creation service is told which races, classes and
//! backgrounds are allowed and asked for a JSON object. Values outside the
//! allowed lists fall back to fixed defaults; a reply that is not a JSON
//! object is an error.

use crate::config::SERVICE_CHARACTER_CREATION;
use crate::dm::Turn;
use crate::llm::{LlmError, Service};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_NAME: &str = "Adventurer";
pub const DEFAULT_RACE: &str = "Human";
pub const DEFAULT_CLASS: &str = "Ranger";
pub const DEFAULT_BACKGROUND: &str = "Urchin";

/// Errors from character creation.
#[derive(Debug, Error)]
pub enum CharacterError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error(
        "Character creation failed: LLM output is not valid JSON ({reason})\n LLM Output: {llm_output}"
    )]
    InvalidJson { reason: String, llm_output: String },

    #[error("Missing initial prompt for service {0}")]
    MissingPrompt(&'static str),
}

/// The races, classes and backgrounds a player may pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterOptions {
    #[serde(default = "default_races")]
    pub races: Vec<String>,
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    #[serde(default = "default_backgrounds")]
    pub backgrounds: Vec<String>,
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn default_races() -> Vec<String> {
    to_strings(&[
        "Human", "Elf", "Dwarf", "Halfling", "Dragonborn", "Gnome", "Half-Elf", "Half-Orc",
        "Tiefling",
    ])
}

fn default_classes() -> Vec<String> {
    to_strings(&[
        "Barbarian", "Bard", "Cleric", "Druid", "Fighter", "Monk", "Paladin", "Ranger", "Rogue",
        "Sorcerer", "Warlock", "Wizard",
    ])
}

fn default_backgrounds() -> Vec<String> {
    to_strings(&[
        "Acolyte",
        "Charlatan",
        "Criminal",
        "Entertainer",
        "Folk Hero",
        "Guild Artisan",
        "Hermit",
        "Noble",
        "Outlander",
        "Sage",
        "Sailor",
        "Soldier",
        "Urchin",
    ])
}

impl Default for CharacterOptions {
    fn default() -> Self {
        Self {
            races: default_races(),
            classes: default_classes(),
            backgrounds: default_backgrounds(),
        }
    }
}

impl CharacterOptions {
    /// System turn listing the allowed values.
    pub fn prompt(&self) -> String {
        format!(
            "Race can only be one from {}\nClass can only be one from {}\nBackground can only be one from {}",
            self.races.join(", "),
            self.classes.join(", "),
            self.backgrounds.join(", ")
        )
    }
}

/// A parsed character concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterConcept {
    pub name: String,
    pub race: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub background: String,
}

/// Builds character concepts through the character-creation service.
pub struct CharacterCreator {
    service: Service,
    options: CharacterOptions,
}

impl CharacterCreator {
    pub fn new(service: Service, options: CharacterOptions) -> Self {
        Self { service, options }
    }

    pub fn options(&self) -> &CharacterOptions {
        &self.options
    }

    /// Ask the service to read `user_message` as a character description.
    pub async fn parse_character_from_text(
        &self,
        user_message: &str,
    ) -> Result<CharacterConcept, CharacterError> {
        let system_prompt = self
            .service
            .initial_prompt()
            .ok_or(CharacterError::MissingPrompt(SERVICE_CHARACTER_CREATION))?;

        let turns = [Turn::system(self.options.prompt()), Turn::user(user_message)];
        let reply = self
            .service
            .llm()
            .chat_completion(system_prompt, &turns)
            .await?;

        let concept = self.parse_reply(&reply)?;
        debug!(
            name = %concept.name,
            race = %concept.race,
            class = %concept.class_name,
            background = %concept.background,
            "Parsed character"
        );
        Ok(concept)
    }

    /// Read a JSON reply, replacing values outside the allowed lists.
    pub fn parse_reply(&self, reply: &str) -> Result<CharacterConcept, CharacterError> {
        let invalid = |reason: String| {
            error!(llm_output = reply, "LLM output is not valid JSON");
            CharacterError::InvalidJson {
                reason,
                llm_output: reply.to_string(),
            }
        };

        let parsed: Value =
            serde_json::from_str(strip_code_fence(reply)).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(fields) = parsed else {
            return Err(invalid("expected a JSON object".to_string()));
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::trim);
        let allowed = |key: &str, options: &[String], fallback: &str| match text(key) {
            Some(value) if options.iter().any(|o| o == value) => value.to_string(),
            _ => fallback.to_string(),
        };

        Ok(CharacterConcept {
            name: text("name")
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_NAME)
                .to_string(),
            race: allowed("race", &self.options.races, DEFAULT_RACE),
            class_name: allowed("class", &self.options.classes, DEFAULT_CLASS),
            background: allowed("background", &self.options.backgrounds, DEFAULT_BACKGROUND),
        })
    }
}

/// Drop a surrounding Markdown code fence, if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCall, MockLlm};
    use std::sync::Arc;

    fn creator(llm: &Arc<MockLlm>) -> CharacterCreator {
        CharacterCreator::new(
            Service::new(llm.clone(), Some("Reply with JSON".to_string())),
            CharacterOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_valid_json() {
        let llm = Arc::new(MockLlm::with_texts([
            r#"{"name": "Thorin", "race": "Dwarf", "class": "Fighter", "background": "Soldier"}"#,
        ]));

        let concept = creator(&llm)
            .parse_character_from_text("A grizzled dwarf veteran named Thorin")
            .await
            .unwrap();

        assert_eq!(
            concept,
            CharacterConcept {
                name: "Thorin".to_string(),
                race: "Dwarf".to_string(),
                class_name: "Fighter".to_string(),
                background: "Soldier".to_string(),
            }
        );

        let calls = llm.calls();
        let MockCall::Chat {
            system_prompt,
            history,
        } = &calls[0]
        else {
            panic!("expected a chat completion");
        };
        assert_eq!(system_prompt, "Reply with JSON");
        assert_eq!(history.len(), 2);
        assert!(history[0].is_system());
        assert!(history[0].content().starts_with("Race can only be one from Human, Elf"));
        assert_eq!(history[1], Turn::user("A grizzled dwarf veteran named Thorin"));
    }

    #[tokio::test]
    async fn test_values_outside_options_fall_back() {
        let llm = Arc::new(MockLlm::with_texts([
            r#"{"race": "Warforged", "class": "Artificer", "background": 7}"#,
        ]));

        let concept = creator(&llm)
            .parse_character_from_text("a construct tinkerer")
            .await
            .unwrap();

        assert_eq!(concept.name, DEFAULT_NAME);
        assert_eq!(concept.race, DEFAULT_RACE);
        assert_eq!(concept.class_name, DEFAULT_CLASS);
        assert_eq!(concept.background, DEFAULT_BACKGROUND);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let llm = Arc::new(MockLlm::with_texts(["Sure! Your character is an elf."]));

        let result = creator(&llm).parse_character_from_text("an elf").await;

        assert!(matches!(
            result,
            Err(CharacterError::InvalidJson { ref llm_output, .. })
                if llm_output == "Sure! Your character is an elf."
        ));
    }

    #[test]
    fn test_non_object_json_rejected() {
        let llm = Arc::new(MockLlm::default());
        assert!(matches!(
            creator(&llm).parse_reply(r#"["Elf", "Wizard"]"#),
            Err(CharacterError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_code_fenced_reply() {
        let llm = Arc::new(MockLlm::default());
        let concept = creator(&llm)
            .parse_reply("```json\n{\"name\": \"Lia\", \"race\": \"Elf\", \"class\": \"Wizard\", \"background\": \"Sage\"}\n```")
            .unwrap();
        assert_eq!(concept.name, "Lia");
        assert_eq!(concept.class_name, "Wizard");
    }

    #[test]
    fn test_custom_options() {
        let llm = Arc::new(MockLlm::default());
        let creator = CharacterCreator::new(
            Service::new(llm, Some("json".to_string())),
            CharacterOptions {
                races: vec!["Elf".to_string()],
                classes: vec!["Wizard".to_string()],
                backgrounds: vec!["Sage".to_string()],
            },
        );
        let concept = creator
            .parse_reply(r#"{"name": "Bob", "race": "Dwarf", "class": "Wizard", "background": "Sage"}"#)
            .unwrap();
        assert_eq!(concept.race, DEFAULT_RACE);
        assert_eq!(concept.class_name, "Wizard");
    }

    #[tokio::test]
    async fn test_missing_prompt() {
        let llm = Arc::new(MockLlm::default());
        let creator = CharacterCreator::new(Service::new(llm, None), CharacterOptions::default());
        assert!(matches!(
            creator.parse_character_from_text("anyone").await,
            Err(CharacterError::MissingPrompt(SERVICE_CHARACTER_CREATION))
        ));
    }
}
