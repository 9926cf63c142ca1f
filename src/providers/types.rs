use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Sender;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Service overloaded: {0}")]
    Overloaded(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the failure is a rate-limit/overload condition rather than a
    /// generic failure. Quota errors sometimes arrive as a plain 400 body, so
    /// the message text is checked too.
    pub fn is_overload(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } | ProviderError::Overloaded(_) => true,
            other => {
                let msg = other.to_string().to_lowercase();
                msg.contains("429")
                    || msg.contains("too many requests")
                    || msg.contains("rate limit exceeded")
                    || msg.contains("quota exceeded")
                    || msg.contains("overloaded")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Sender,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Sender::User,
            content: content.into(),
        }
    }
}

#[derive(Clone)]
pub struct ChatRequest {
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("messages", &self.messages)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: Option<i64>,
    pub tokens_out: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_overload() {
        assert!(ProviderError::RateLimited {
            retry_after_secs: None
        }
        .is_overload());
        assert!(ProviderError::Overloaded("model is overloaded".into()).is_overload());
    }

    #[test]
    fn test_quota_message_is_overload() {
        let err = ProviderError::RequestFailed("HTTP 400: Quota exceeded for metric".into());
        assert!(err.is_overload());
    }

    #[test]
    fn test_generic_failure_is_not_overload() {
        assert!(!ProviderError::NetworkError("connection reset".into()).is_overload());
        assert!(!ProviderError::AuthError("Invalid API key".into()).is_overload());
    }

    #[test]
    fn test_request_debug_hides_key() {
        let request = ChatRequest {
            api_key: "secret".into(),
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            base_url: None,
            temperature: None,
            system_prompt: None,
        };
        assert!(!format!("{:?}", request).contains("secret"));
    }
}
