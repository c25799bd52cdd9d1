//! Google Generative Language provider (`models/{model}:generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{InsightError, TextGenerator};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: &str) -> Self {
        Self::with_base_url(api_key, model, GEMINI_API_BASE)
    }

    /// Point the generator at a different API root.
    pub fn with_base_url(api_key: String, model: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightError::GenerationFailed(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            error!("Gemini returned {}: {}", status, text);
            return Err(InsightError::GenerationFailed(format!("provider returned {status}")));
        }

        let data: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| InsightError::GenerationFailed(format!("response parse error: {e}")))?;

        let text: String = data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(InsightError::GenerationFailed("provider returned no text".into()));
        }

        debug!("Gemini response: {} chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    async fn serve() -> SocketAddr {
        let app = Router::new()
            .route(
                "/models/good:generateContent",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("k") {
                        return StatusCode::FORBIDDEN.into_response();
                    }
                    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
                    Json(json!({
                        "candidates": [{
                            "content": { "parts": [
                                { "text": "echo: " },
                                { "text": prompt.len().to_string() }
                            ]}
                        }]
                    }))
                    .into_response()
                }),
            )
            .route(
                "/models/empty:generateContent",
                post(|| async { Json(json!({ "candidates": [] })) }),
            )
            .route(
                "/models/down:generateContent",
                post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn joins_candidate_parts() {
        let addr = serve().await;
        let generator = GeminiGenerator::with_base_url("k".into(), "good", &format!("http://{addr}/"));
        let text = generator.generate("hello").await.unwrap();
        assert_eq!(text, "echo: 5");
    }

    #[tokio::test]
    async fn upstream_errors_are_generation_failures() {
        let addr = serve().await;
        let base = format!("http://{addr}");

        let wrong_key = GeminiGenerator::with_base_url("nope".into(), "good", &base);
        assert!(matches!(
            wrong_key.generate("hello").await,
            Err(InsightError::GenerationFailed(_))
        ));

        let empty = GeminiGenerator::with_base_url("k".into(), "empty", &base);
        assert!(matches!(empty.generate("hello").await, Err(InsightError::GenerationFailed(_))));

        let down = GeminiGenerator::with_base_url("k".into(), "down", &base);
        assert!(matches!(down.generate("hello").await, Err(InsightError::GenerationFailed(_))));
    }
}
