use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as epoch milliseconds, the unit every stored timestamp uses.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// A single chat bubble. Either carries content (`text` and/or `code`) or is a
/// transient loading placeholder, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn user(id: String, text: String, timestamp: i64) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: Some(text),
            code: None,
            timestamp,
            is_loading: false,
            is_error: false,
        }
    }

    pub fn ai(id: String, text: Option<String>, code: Option<String>, timestamp: i64) -> Self {
        Self {
            id,
            sender: Sender::Ai,
            text,
            code,
            timestamp,
            is_loading: false,
            is_error: false,
        }
    }

    pub fn ai_error(id: String, text: String, timestamp: i64) -> Self {
        Self {
            is_error: true,
            ..Self::ai(id, Some(text), None, timestamp)
        }
    }

    #[cfg(test)]
    pub(crate) fn loading_placeholder(id: String, timestamp: i64) -> Self {
        Self {
            is_loading: true,
            ..Self::ai(id, None, None, timestamp)
        }
    }
}
