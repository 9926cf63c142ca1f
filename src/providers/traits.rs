use async_trait::async_trait;

use super::types::{ChatRequest, ChatResponse, ProviderError};

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}
