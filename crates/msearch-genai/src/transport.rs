//! Generation transport: the single upstream "generate content" capability.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{GenAiError, GenAiResult};
use crate::types::{Content, GenerateContentRequest, GenerateResponse, GenerationConfig};

/// Default REST endpoint for the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// One generation call against a named model. Implementations perform no
/// retries or rate limiting of their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &GenerationConfig,
    ) -> GenAiResult<GenerateResponse>;
}

/// Gemini REST transport.
pub struct GeminiTransport {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiTransport {
    pub fn new(api_key: impl Into<String>) -> GenAiResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> GenAiResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GenAiError::invalid_config("GEMINI_API_KEY not set"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| GenAiError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerationTransport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &GenerationConfig,
    ) -> GenAiResult<GenerateResponse> {
        let request = GenerateContentRequest::new(contents, config);
        debug!(model, parts = contents.iter().map(|c| c.parts.len()).sum::<usize>(), "Calling generateContent");

        let response = self
            .client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GenAiError::decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Part;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn contents() -> Vec<Content> {
        vec![Content::user(vec![Part::text("hello")])]
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/creative-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }],
                "systemInstruction": { "parts": [{ "text": "Be brief." }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }],
                "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 1 }
            })))
            .mount(&server)
            .await;

        let transport = GeminiTransport::with_base_url("test-key", server.uri()).unwrap();
        let config = GenerationConfig::default().with_overrides(Some("Be brief."), None);
        let response = transport
            .generate("creative-flash", &contents(), &config)
            .await
            .unwrap();

        assert_eq!(response.text(), "hi");
        assert_eq!(response.usage_metadata.prompt_token_count, 3);
    }

    #[tokio::test]
    async fn test_generate_throttled_is_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let transport = GeminiTransport::with_base_url("test-key", server.uri()).unwrap();
        let err = transport
            .generate("creative-flash", &contents(), &GenerationConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenAiError::Http { status: 429, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_bad_request_is_terminal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad schema"))
            .mount(&server)
            .await;

        let transport = GeminiTransport::with_base_url("test-key", server.uri()).unwrap();
        let err = transport
            .generate("creative-flash", &contents(), &GenerationConfig::default())
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_error_hides_credentials() {
        let transport = GeminiTransport::with_base_url("secret-key-123", "http://127.0.0.1:1").unwrap();
        let err = transport
            .generate("creative-flash", &contents(), &GenerationConfig::default())
            .await
            .unwrap_err();

        let text = err.to_string();
        assert!(matches!(err, GenAiError::Transport(_)));
        assert!(!text.contains("secret-key-123"), "{}", text);
        assert!(!text.contains("generateContent"), "{}", text);
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            GeminiTransport::new(""),
            Err(GenAiError::InvalidConfig(_))
        ));
    }
}
