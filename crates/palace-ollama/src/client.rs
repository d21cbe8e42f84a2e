// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for Ollama's chat API in JSON mode.

use std::time::Duration;

use palace_config::AnalyzerConfig;
use palace_core::{HealthStatus, PalaceError};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatMessage, ChatOptions, ChatRequest, ChatResponse};

/// Shared by the scorer and the narrator.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self, PalaceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PalaceError::CollaboratorUnavailable {
                collaborator: "ollama".into(),
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            max_retries: 1,
        })
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, PalaceError> {
        Self::new(
            config.ollama_url.clone(),
            config.model.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single user message and parse the reply as JSON.
    ///
    /// Retries once on 5xx. Transport failures and non-JSON replies are
    /// `CollaboratorUnavailable` and `MalformedPayload` respectively.
    pub async fn chat_json(&self, prompt: &str) -> Result<serde_json::Value, PalaceError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
            format: "json".to_string(),
            options: ChatOptions {
                temperature: self.temperature,
            },
        };
        let url = format!("{}/api/chat", self.base_url);

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying ollama chat after transient error");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| PalaceError::CollaboratorUnavailable {
                    collaborator: "ollama".into(),
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, model = %self.model, "ollama chat response");

            if status.is_success() {
                let body: ChatResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| PalaceError::MalformedPayload {
                            message: format!("unreadable ollama response: {e}"),
                            source: Some(Box::new(e)),
                        })?;
                return serde_json::from_str(body.message.content.trim())
                    .map_err(|e| PalaceError::malformed("model reply is not valid JSON", e));
            }

            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api) => format!("ollama returned {status}: {}", api.error),
                Err(_) => format!("ollama returned {status}: {body}"),
            };
            if status.is_server_error() && attempt < self.max_retries {
                last_error = Some(PalaceError::unavailable("ollama", message));
                continue;
            }
            return Err(PalaceError::unavailable("ollama", message));
        }

        Err(last_error.unwrap_or_else(|| PalaceError::unavailable("ollama", "chat failed after retries")))
    }

    /// Healthy when Ollama answers and knows the configured model.
    pub async fn health(&self) -> HealthStatus {
        let url = format!("{}/api/show", self.base_url);
        match self
            .client
            .post(&url)
            .json(&serde_json::json!({ "model": self.model }))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => HealthStatus::Healthy,
            Ok(r) if r.status() == reqwest::StatusCode::NOT_FOUND => {
                HealthStatus::Unhealthy(format!("model '{}' is not installed", self.model))
            }
            Ok(r) => HealthStatus::Degraded(format!("ollama returned {}", r.status())),
            Err(e) => HealthStatus::Unhealthy(format!("ollama unreachable: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> OllamaClient {
        OllamaClient::new(uri, "gemma3n:e2b", 0.1, Duration::from_secs(5)).unwrap()
    }

    fn reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "gemma3n:e2b",
            "message": {"role": "assistant", "content": content},
            "done": true
        })
    }

    #[tokio::test]
    async fn chat_json_sends_json_mode_and_parses_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "gemma3n:e2b",
                "stream": false,
                "format": "json",
                "options": {"temperature": 0.1}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(r#"{"a": 1}"#)))
            .mount(&server)
            .await;

        let value = client(&server.uri()).chat_json("hello").await.unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn non_json_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("sure! here you go")))
            .mount(&server)
            .await;

        let err = client(&server.uri()).chat_json("hello").await.unwrap_err();
        assert!(matches!(err, PalaceError::MalformedPayload { .. }), "got {err}");
    }

    #[tokio::test]
    async fn server_error_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({"error": "loading"})))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server.uri()).chat_json("hello").await.unwrap_err();
        assert!(matches!(err, PalaceError::CollaboratorUnavailable { .. }));
        assert!(err.to_string().contains("loading"), "got {err}");
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let err = client("http://127.0.0.1:9").chat_json("hello").await.unwrap_err();
        assert!(err.is_degradable());
    }

    #[tokio::test]
    async fn health_reports_missing_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/show"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        match client(&server.uri()).health().await {
            HealthStatus::Unhealthy(msg) => assert!(msg.contains("not installed")),
            other => panic!("expected unhealthy, got {other:?}"),
        }
    }
}
