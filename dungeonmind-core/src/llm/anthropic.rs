//! Anthropic backend on top of the `claude` client.

use super::{LlmError, LlmService};
use crate::dm::{Turn, TurnRole};
use async_trait::async_trait;
use claude::{Claude, Message, Request};

/// Claude-backed service.
///
/// The Messages API has no system role, so system turns found in a history
/// are appended to the system prompt in order.
pub struct AnthropicService {
    client: Claude,
    temperature: Option<f32>,
    max_tokens: usize,
}

impl AnthropicService {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            temperature: None,
            max_tokens: 4096,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request(&self, system: Option<String>, messages: Vec<Message>) -> Request {
        let mut request = Request::new(messages).with_max_tokens(self.max_tokens);
        if let Some(system) = system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    async fn send(&self, request: Request) -> Result<String, LlmError> {
        let response = self.client.complete(request).await?;
        Ok(response.text)
    }
}

/// Split a history into a combined system prompt and API messages.
fn to_request_parts(system_prompt: &str, history: &[Turn]) -> (String, Vec<Message>) {
    let mut system = system_prompt.to_string();
    let mut messages = Vec::with_capacity(history.len());

    for turn in history {
        match turn.role() {
            TurnRole::System => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(turn.content());
            }
            TurnRole::User => messages.push(Message::user(turn.content())),
            TurnRole::Assistant => messages.push(Message::assistant(turn.content())),
        }
    }

    (system, messages)
}

#[async_trait]
impl LlmService for AnthropicService {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        self.client.model()
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, LlmError> {
        let (system, messages) = to_request_parts(system_prompt, history);
        let system = (!system.is_empty()).then_some(system);
        self.send(self.request(system, messages)).await
    }

    async fn one_off(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError> {
        let request = self.request(
            Some(system_prompt.to_string()),
            vec![Message::user(user_input)],
        );
        self.send(request).await
    }

    async fn formatted_response(&self, prompt: &str) -> Result<String, LlmError> {
        self.send(self.request(None, vec![Message::user(prompt)]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_turns_fold_into_system_prompt() {
        let history = vec![
            Turn::system("Campaign: The Lost Mine"),
            Turn::user("I enter the cave"),
            Turn::system("Summary: the party rested"),
            Turn::assistant("Darkness surrounds you."),
        ];

        let (system, messages) = to_request_parts("You are the DM", &history);

        assert_eq!(
            system,
            "You are the DM\n\nCampaign: The Lost Mine\n\nSummary: the party rested"
        );
        assert_eq!(
            messages,
            vec![
                Message::user("I enter the cave"),
                Message::assistant("Darkness surrounds you.")
            ]
        );
    }

    #[test]
    fn test_empty_system_prompt() {
        let (system, messages) = to_request_parts("", &[Turn::system("only"), Turn::user("hi")]);
        assert_eq!(system, "only");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_service_metadata() {
        let client = Claude::new("test-key").unwrap().with_model("claude-3-opus");
        let service = AnthropicService::new(client).with_temperature(0.7);
        assert_eq!(service.name(), "anthropic");
        assert_eq!(service.model(), "claude-3-opus");
        assert_eq!(service.temperature, Some(0.7));
    }
}
