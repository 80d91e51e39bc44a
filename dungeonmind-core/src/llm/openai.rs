//! OpenAI chat-completions backend.

use super::{LlmError, LlmService};
use crate::dm::Turn;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.openai.com/v1";

/// Service speaking the OpenAI chat-completions protocol.
pub struct OpenAiService {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiService {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: API_BASE.to_string(),
            model: model.into(),
            temperature: None,
        })
    }

    /// Create from the named environment variable.
    pub fn from_env_var(var: &str, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var(var).map_err(|_| LlmError::MissingApiKey(var.to_string()))?;
        Self::new(api_key, model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Use any OpenAI-compatible endpoint.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn build_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| LlmError::MalformedResponse(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }

    async fn send(&self, messages: Vec<ApiMessage<'_>>) -> Result<String, LlmError> {
        let body = ApiRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        first_choice_text(parsed)
    }
}

fn to_api_messages<'a>(system_prompt: &'a str, history: &'a [Turn]) -> Vec<ApiMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ApiMessage {
        role: "system",
        content: system_prompt,
    });
    messages.extend(history.iter().map(|turn| ApiMessage {
        role: turn.role().as_str(),
        content: turn.content(),
    }));
    messages
}

fn first_choice_text(response: ApiResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::MalformedResponse("response contained no message content".into()))
}

#[async_trait]
impl LlmService for OpenAiService {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, LlmError> {
        self.send(to_api_messages(system_prompt, history)).await
    }

    async fn one_off(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError> {
        self.send(vec![
            ApiMessage {
                role: "system",
                content: system_prompt,
            },
            ApiMessage {
                role: "user",
                content: user_input,
            },
        ])
        .await
    }

    async fn formatted_response(&self, prompt: &str) -> Result<String, LlmError> {
        self.send(vec![ApiMessage {
            role: "user",
            content: prompt,
        }])
        .await
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_system_turns_in_place() {
        let history = vec![
            Turn::system("Campaign notes"),
            Turn::user("Hello"),
            Turn::assistant("Well met."),
        ];
        let messages = to_api_messages("You are the DM", &history);
        let json = serde_json::to_value(&messages).unwrap();

        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "You are the DM");
        assert_eq!(json[1]["role"], "system");
        assert_eq!(json[2]["role"], "user");
        assert_eq!(json[3]["content"], "Well met.");
    }

    #[test]
    fn test_first_choice_text() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"A dragon!"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(response).unwrap(), "A dragon!");
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let response: ApiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            first_choice_text(response),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_missing_key() {
        let result = OpenAiService::from_env_var("DUNGEONMIND_TEST_UNSET_OPENAI", "gpt-4");
        assert!(matches!(result, Err(LlmError::MissingApiKey(var)) if var == "DUNGEONMIND_TEST_UNSET_OPENAI"));
    }
}
