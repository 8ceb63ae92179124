use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use learn_core::model::AppSettings;

use crate::error::ChatAssistantError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TOPIC: &str = "General Programming";
const MAX_TOKENS: u32 = 1000;

#[derive(Clone, Debug)]
pub struct ChatAssistantConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub history_limit: usize,
}

impl ChatAssistantConfig {
    /// Build a config from validated settings. `None` without an API key.
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Option<Self> {
        let api_key = settings.api_key()?.to_string();
        Some(Self {
            base_url: settings.api_base_url().unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key,
            model: settings.api_model().unwrap_or(DEFAULT_MODEL).to_string(),
            history_limit: settings.chat_history_limit(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One message of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Programming help assistant backed by an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct ChatAssistantService {
    client: Client,
    config: Option<ChatAssistantConfig>,
}

impl ChatAssistantService {
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(ChatAssistantConfig::from_settings(settings))
    }

    #[must_use]
    pub fn new(config: Option<ChatAssistantConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Ask a question about `topic`, with prior turns for context.
    ///
    /// Only the most recent `history_limit` turns are sent.
    ///
    /// # Errors
    ///
    /// Returns `ChatAssistantError` when the service is disabled, the message is
    /// blank, the request fails, or the response is empty.
    pub async fn ask(
        &self,
        message: &str,
        topic: Option<&str>,
        history: &[ChatTurn],
    ) -> Result<String, ChatAssistantError> {
        let config = self.config.as_ref().ok_or(ChatAssistantError::Disabled)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatAssistantError::EmptyMessage);
        }

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = build_request(config, message, topic, history);
        info!(
            model = %config.model,
            topic = topic.unwrap_or(DEFAULT_TOPIC),
            history = payload.messages.len() - 2,
            "chat request"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatAssistantError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ChatAssistantError::EmptyResponse)?;

        debug!(chars = content.len(), "chat response");
        Ok(content)
    }
}

/// Running transcript for one chat, bound to a topic.
#[derive(Debug, Clone, Default)]
pub struct ChatConversation {
    topic: Option<String>,
    turns: Vec<ChatTurn>,
}

impl ChatConversation {
    #[must_use]
    pub fn new(topic: Option<String>) -> Self {
        Self {
            topic: topic.filter(|t| !t.trim().is_empty()),
            turns: Vec::new(),
        }
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Send a message and record both sides of the exchange.
    ///
    /// The transcript is left untouched when the request fails.
    ///
    /// # Errors
    ///
    /// Propagates `ChatAssistantError` from [`ChatAssistantService::ask`].
    pub async fn send(
        &mut self,
        assistant: &ChatAssistantService,
        message: &str,
    ) -> Result<String, ChatAssistantError> {
        let reply = assistant
            .ask(message, self.topic.as_deref(), &self.turns)
            .await?;
        self.turns.push(ChatTurn::user(message.trim()));
        self.turns.push(ChatTurn::assistant(reply.clone()));
        Ok(reply)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// System prompt for a programming topic.
#[must_use]
pub fn system_prompt(topic: Option<&str>) -> String {
    let topic = topic
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TOPIC);
    format!(
        "You are a helpful {topic} programming assistant. You are knowledgeable about \
         programming concepts, best practices, debugging, and code optimization.\n\n\
         Be friendly, patient and encouraging. Give clear, concise explanations with \
         practical examples, and help users learn step by step. If you are unsure, say so.\n\n\
         Focus areas for {topic}: syntax and language features, conventions, common \
         pitfalls, debugging techniques, performance, code organization, popular \
         frameworks and libraries, and real-world applications."
    )
}

fn build_request(
    config: &ChatAssistantConfig,
    message: &str,
    topic: Option<&str>,
    history: &[ChatTurn],
) -> ChatRequest {
    let recent = &history[history.len().saturating_sub(config.history_limit)..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: system_prompt(topic),
    });
    messages.extend(recent.iter().map(|turn| ChatMessage {
        role: turn.role.as_str(),
        content: turn.content.clone(),
    }));
    messages.push(ChatMessage {
        role: ChatRole::User.as_str(),
        content: message.to_string(),
    });

    ChatRequest {
        model: config.model.clone(),
        messages,
        max_tokens: MAX_TOKENS,
        temperature: 0.7,
        presence_penalty: 0.1,
        frequency_penalty: 0.1,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{AppSettingsDraft, DEFAULT_CHAT_HISTORY_LIMIT};

    fn config(history_limit: usize) -> ChatAssistantConfig {
        ChatAssistantConfig {
            base_url: "http://localhost:9".into(),
            api_key: "test".into(),
            model: "test-model".into(),
            history_limit,
        }
    }

    #[test]
    fn config_requires_api_key() {
        let settings = AppSettingsDraft::new().validate().unwrap();
        assert!(ChatAssistantConfig::from_settings(&settings).is_none());
        assert!(!ChatAssistantService::from_settings(&settings).enabled());

        let settings = AppSettingsDraft {
            api_key: Some("sk-test".into()),
            ..AppSettingsDraft::new()
        }
        .validate()
        .unwrap();
        let config = ChatAssistantConfig::from_settings(&settings).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.history_limit, DEFAULT_CHAT_HISTORY_LIMIT);
    }

    #[test]
    fn system_prompt_names_topic() {
        assert!(system_prompt(Some("Rust")).starts_with("You are a helpful Rust programming"));
        assert!(system_prompt(Some("  ")).contains(DEFAULT_TOPIC));
        assert!(system_prompt(None).contains(DEFAULT_TOPIC));
    }

    #[test]
    fn request_keeps_only_recent_history() {
        let history: Vec<_> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("u{i}"))
                } else {
                    ChatTurn::assistant(format!("a{i}"))
                }
            })
            .collect();

        let request = build_request(&config(5), "next", Some("Python"), &history);
        let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(&contents[1..], ["a3", "u4", "a5", "u6", "a7", "next"]);
        assert_eq!(request.messages[1].role, "assistant");
        assert_eq!(request.max_tokens, 1000);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "test-model");
        assert!(json["temperature"].as_f64().unwrap() > 0.69);

        let request = build_request(&config(0), "solo", None, &history);
        assert_eq!(request.messages.len(), 2);
    }

    #[tokio::test]
    async fn disabled_and_blank_messages_fail_fast() {
        let disabled = ChatAssistantService::new(None);
        assert!(matches!(
            disabled.ask("hi", None, &[]).await.unwrap_err(),
            ChatAssistantError::Disabled
        ));

        let enabled = ChatAssistantService::new(Some(config(5)));
        let mut conversation = ChatConversation::new(Some("Java".into()));
        assert!(matches!(
            conversation.send(&enabled, "   ").await.unwrap_err(),
            ChatAssistantError::EmptyMessage
        ));
        assert!(conversation.turns().is_empty());
        assert_eq!(conversation.topic(), Some("Java"));
    }
}
