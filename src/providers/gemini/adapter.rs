use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::models::*;
use crate::models::Sender;
use crate::providers::traits::AiProvider;
use crate::providers::types::*;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn base_url(custom: Option<&str>) -> &str {
        custom.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/')
    }

    /// Parse an API error response body into a user-friendly message.
    fn parse_error_message(status: StatusCode, body: &str) -> String {
        // Gemini wraps errors as {"error": {"message": ...}}
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(msg) = parsed["error"]["message"].as_str() {
                return format!("HTTP {}: {}", status.as_u16(), msg);
            }
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    fn translate_role(role: &Sender) -> &'static str {
        match role {
            Sender::User => "user",
            Sender::Ai => "model",
        }
    }

    fn build_contents(messages: &[ChatMessage]) -> Vec<GeminiContent> {
        messages
            .iter()
            .map(|msg| GeminiContent {
                role: Some(Self::translate_role(&msg.role).to_string()),
                parts: vec![GeminiPart {
                    text: Some(msg.content.clone()),
                }],
            })
            .collect()
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        let system_instruction = request.system_prompt.as_ref().map(|prompt| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(prompt.clone()),
            }],
        });

        GeminiRequest {
            contents: Self::build_contents(&request.messages),
            system_instruction,
            generation_config: request.temperature.map(|t| GeminiGenerationConfig {
                temperature: Some(t),
            }),
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let base = Self::base_url(request.base_url.as_deref());
        let url = format!("{}/models/{}:generateContent", base, request.model);

        let gemini_request = Self::build_request(&request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &request.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Overloaded(Self::parse_error_message(
                status, &body,
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(error) = gemini_response.error {
            return Err(ProviderError::RequestFailed(
                error.message.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        // A candidate may split its text across several parts.
        let content = gemini_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))?;

        let (tokens_in, tokens_out) = gemini_response
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((None, None));

        Ok(ChatResponse {
            content,
            model: request.model,
            tokens_in,
            tokens_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(server: &MockServer) -> ChatRequest {
        ChatRequest {
            api_key: "test-key".to_string(),
            model: "gemini-2.5-flash".to_string(),
            messages: vec![
                ChatMessage {
                    role: Sender::Ai,
                    content: "Hi!".to_string(),
                },
                ChatMessage::user("write a loop"),
            ],
            base_url: Some(server.uri()),
            temperature: None,
            system_prompt: Some("You are RoboCoach".to_string()),
        }
    }

    #[test]
    fn test_build_request_maps_roles_and_system_instruction() {
        let req = ChatRequest {
            api_key: String::new(),
            model: String::new(),
            messages: vec![
                ChatMessage::user("a"),
                ChatMessage {
                    role: Sender::Ai,
                    content: "b".into(),
                },
            ],
            base_url: None,
            temperature: None,
            system_prompt: Some("persona".into()),
        };
        let json = serde_json::to_value(GeminiProvider::build_request(&req)).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "persona");
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_build_request_sets_temperature() {
        let req = ChatRequest {
            api_key: String::new(),
            model: String::new(),
            messages: vec![ChatMessage::user("a")],
            base_url: None,
            temperature: Some(0.5),
            system_prompt: None,
        };
        let json = serde_json::to_value(GeminiProvider::build_request(&req)).unwrap();
        assert_eq!(json["generationConfig"]["temperature"], 0.5);
        assert!(json.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "You are RoboCoach" }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "for i = 1, 10 do" }, { "text": " end" }] }
                }],
                "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 5 }
            })))
            .mount(&server)
            .await;

        let response = GeminiProvider::new()
            .send_message(request(&server))
            .await
            .unwrap();
        assert_eq!(response.content, "for i = 1, 10 do end");
        assert_eq!(response.tokens_in, Some(12));
        assert_eq!(response.tokens_out, Some(5));
    }

    #[tokio::test]
    async fn test_send_message_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let err = GeminiProvider::new()
            .send_message(request(&server))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
        assert!(err.is_overload());
    }

    #[tokio::test]
    async fn test_send_message_overloaded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "message": "The model is overloaded." }
            })))
            .mount(&server)
            .await;

        let err = GeminiProvider::new()
            .send_message(request(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Overloaded(_)));
        assert!(err.is_overload());
    }

    #[tokio::test]
    async fn test_send_message_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Invalid argument" }
            })))
            .mount(&server)
            .await;

        let err = GeminiProvider::new()
            .send_message(request(&server))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request failed: HTTP 400: Invalid argument");
        assert!(!err.is_overload());
    }

    #[tokio::test]
    async fn test_send_message_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = GeminiProvider::new()
            .send_message(request(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_send_message_without_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = GeminiProvider::new()
            .send_message(request(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
