//! Cohere v2 chat provider (secondary generator, also used for merging)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{GenerationParams, TextGenerator};

/// Model used for every Cohere call
pub const COHERE_MODEL: &str = "command-a-03-2025";

const DEFAULT_BASE_URL: &str = "https://api.cohere.com";

/// Cohere chat provider
pub struct CohereGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    params: GenerationParams,
}

impl std::fmt::Debug for CohereGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("params", &self.params)
            .finish()
    }
}

impl CohereGenerator {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: COHERE_MODEL.to_string(),
            params: GenerationParams::FIXED,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build a chat request with a single user turn
    fn request_body(model: &str, prompt: &str, params: GenerationParams) -> CohereRequest {
        CohereRequest {
            model: model.to_string(),
            messages: vec![CohereMessage {
                role: "user".to_string(),
                content: vec![CohereSegment {
                    r#type: "text".to_string(),
                    text: Some(prompt.to_string()),
                }],
            }],
            temperature: params.temperature,
            max_tokens: params.max_output_tokens,
        }
    }

    /// Concatenate the text segments of the reply message
    fn extract_text(resp: &CohereApiResponse) -> String {
        resp.message
            .as_ref()
            .map(|m| {
                m.content
                    .iter()
                    .filter_map(|seg| seg.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[async_trait]
impl TextGenerator for CohereGenerator {
    fn provider_name(&self) -> &str {
        "cohere"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = Self::request_body(&self.model, prompt, self.params);

        debug!("Cohere request: model={}, prompt_chars={}", self.model, prompt.len());

        let response = self
            .client
            .post(format!("{}/v2/chat", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Cohere API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Cohere API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: CohereApiResponse = response
            .json()
            .await
            .context("Failed to parse Cohere API response")?;

        debug!(
            "Cohere response: finish_reason={:?}",
            api_response.finish_reason
        );

        Ok(Self::extract_text(&api_response))
    }
}

// ── Cohere wire types ──

#[derive(Debug, Clone, Serialize)]
struct CohereRequest {
    model: String,
    messages: Vec<CohereMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CohereMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Vec<CohereSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CohereSegment {
    #[serde(default)]
    r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CohereApiResponse {
    #[serde(default)]
    message: Option<CohereMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    fn parse(json: &str) -> CohereApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = CohereGenerator::request_body(COHERE_MODEL, "hi", GenerationParams::FIXED);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], COHERE_MODEL);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][0]["text"], "hi");
        assert_eq!(json["max_tokens"], 150);
    }

    #[test]
    fn test_extract_text_concatenates_segments() {
        let resp = parse(
            r#"{"id":"x","finish_reason":"COMPLETE","message":{"role":"assistant","content":[{"type":"text","text":"Hello "},{"type":"thinking"},{"type":"text","text":"there "}]}}"#,
        );
        assert_eq!(CohereGenerator::extract_text(&resp), "Hello there");
    }

    #[test]
    fn test_extract_text_missing_fields() {
        assert_eq!(CohereGenerator::extract_text(&parse("{}")), "");
        assert_eq!(
            CohereGenerator::extract_text(&parse(r#"{"message":{"role":"assistant"}}"#)),
            ""
        );
        assert_eq!(
            CohereGenerator::extract_text(&parse(r#"{"message":{"content":[]}}"#)),
            ""
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let generator = CohereGenerator::new("co-secret-key".to_string());
        let debug = format!("{:?}", generator);
        assert!(!debug.contains("co-secret-key"));
    }

    #[tokio::test]
    async fn test_generate_against_stub() {
        let router = Router::new().fallback(|headers: HeaderMap, body: String| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let req: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            let prompt = req["messages"][0]["content"][0]["text"].as_str().unwrap_or_default();
            axum::Json(serde_json::json!({
                "message": {
                    "role": "assistant",
                    "content": [
                        {"type": "text", "text": format!("{} | ", auth)},
                        {"type": "text", "text": prompt}
                    ]
                },
                "finish_reason": "COMPLETE"
            }))
        });
        let base = spawn_stub(router).await;

        let generator = CohereGenerator::new("co-key".to_string()).with_base_url(base);
        let text = generator.generate("ping").await.unwrap();
        assert_eq!(text, "Bearer co-key | ping");
        assert_eq!(generator.generate("ping").await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_generate_malformed_body_is_error() {
        let router =
            Router::new().fallback(|| async { (StatusCode::OK, "not json").into_response() });
        let base = spawn_stub(router).await;

        let generator = CohereGenerator::new("k".to_string()).with_base_url(base);
        assert!(generator.generate("ping").await.is_err());
    }
}
