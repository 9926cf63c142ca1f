use std::sync::Arc;

use uuid::Uuid;

use super::assembler::assemble_message;
use super::parser::{fence_code, parse_response};
use crate::config::{
    title_prompt, DEFAULT_CHAT_TITLE, SERVER_OVERLOAD_ERROR_MESSAGE, SYSTEM_INSTRUCTION,
    UNPARSEABLE_RESPONSE_MESSAGE,
};
use crate::models::{now_millis, Message};
use crate::providers::{AiProvider, ChatMessage, ChatRequest, ProviderError};

/// One-request-per-turn wrapper around the remote model.
pub struct GenerationClient {
    provider: Arc<dyn AiProvider>,
    api_key: Option<String>,
    model: String,
    base_url: Option<String>,
    temperature: Option<f32>,
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        api_key: Option<String>,
        model: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            provider,
            api_key,
            model,
            base_url,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn request(
        &self,
        api_key: &str,
        messages: Vec<ChatMessage>,
        system_prompt: Option<&str>,
    ) -> ChatRequest {
        ChatRequest {
            api_key: api_key.to_string(),
            model: self.model.clone(),
            messages,
            base_url: self.base_url.clone(),
            temperature: self.temperature,
            system_prompt: system_prompt.map(str::to_string),
        }
    }

    /// Derive a short chat title from the first user message. Never fails:
    /// any problem yields the default title.
    pub async fn generate_title(&self, seed_text: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return DEFAULT_CHAT_TITLE.to_string();
        };

        let messages = vec![ChatMessage::user(title_prompt(seed_text))];
        let request = self.request(api_key, messages, None);

        match self.provider.send_message(request).await {
            Ok(response) => clean_title(&response.content),
            Err(e) => {
                if e.is_overload() {
                    tracing::warn!("Chat title generation rate limited: {}", e);
                } else {
                    tracing::error!("Error generating chat title: {}", e);
                }
                DEFAULT_CHAT_TITLE.to_string()
            }
        }
    }

    /// Run one conversation turn and return the assistant message to append.
    ///
    /// Failures come back as an `is_error` message rather than an `Err`, so
    /// the chat history stays a complete record of the exchange.
    pub async fn converse(&self, prompt: &str, history: &[Message]) -> Message {
        let now = now_millis();

        let Some(api_key) = self.api_key.as_deref() else {
            return Message::ai_error(
                new_message_id(),
                SERVER_OVERLOAD_ERROR_MESSAGE.to_string(),
                now,
            );
        };

        let mut turns = history_to_turns(history);
        turns.push(ChatMessage::user(prompt));

        let request = self.request(api_key, turns, Some(SYSTEM_INSTRUCTION));

        match self.provider.send_message(request).await {
            Ok(response) => {
                tracing::debug!(
                    tokens_in = ?response.tokens_in,
                    tokens_out = ?response.tokens_out,
                    "Generation finished"
                );
                let segments = parse_response(response.content.trim());
                assemble_message(&segments, new_message_id(), now).unwrap_or_else(|| {
                    tracing::warn!("Model returned no usable content");
                    Message::ai_error(
                        new_message_id(),
                        UNPARSEABLE_RESPONSE_MESSAGE.to_string(),
                        now,
                    )
                })
            }
            Err(e) => {
                tracing::error!("Error processing prompt: {}", e);
                Message::ai_error(new_message_id(), error_text(&e), now)
            }
        }
    }
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

fn error_text(err: &ProviderError) -> String {
    if err.is_overload() {
        SERVER_OVERLOAD_ERROR_MESSAGE.to_string()
    } else {
        format!(
            "Error: {}. Please check your API key and network connection, or the API key may be invalid.",
            err
        )
    }
}

/// Map stored messages to provider turns. Text wins over code; a code-only
/// message is sent back as a fenced block. Placeholders and empty messages
/// are skipped.
pub fn history_to_turns(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|m| !m.is_loading)
        .filter_map(|m| {
            let content = match (m.text.as_deref(), m.code.as_deref()) {
                (Some(text), _) if !text.is_empty() => text.to_string(),
                (_, Some(code)) if !code.is_empty() => fence_code(code),
                _ => return None,
            };
            Some(ChatMessage {
                role: m.sender,
                content,
            })
        })
        .collect()
}

/// Trim, strip quotes and keep the first line of a generated title.
pub fn clean_title(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    let cleaned = cleaned.strip_prefix("Title:").unwrap_or(cleaned).trim();

    if cleaned.is_empty() {
        DEFAULT_CHAT_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}
