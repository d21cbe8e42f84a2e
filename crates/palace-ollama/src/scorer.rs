// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Significance scoring through Ollama.

use async_trait::async_trait;

use palace_core::{
    Collaborator, CollaboratorKind, HealthStatus, Memory, PalaceError, RawSignificance,
    SignificanceScorer,
};
use palace_significance::analysis_prompt;

use crate::client::OllamaClient;

/// Scores memories with the analysis prompt. Returns the model's raw JSON;
/// validation and fallback belong to the analyzer.
#[derive(Debug, Clone)]
pub struct OllamaScorer {
    client: OllamaClient,
}

impl OllamaScorer {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collaborator for OllamaScorer {
    fn name(&self) -> &str {
        "ollama-scorer"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Scorer
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        Ok(self.client.health().await)
    }
}

#[async_trait]
impl SignificanceScorer for OllamaScorer {
    async fn score(&self, memory: &Memory) -> Result<RawSignificance, PalaceError> {
        let value = self.client.chat_json(&analysis_prompt(memory)).await?;
        if !value.is_object() {
            return Err(PalaceError::MalformedPayload {
                message: format!("expected a JSON object, got {value}"),
                source: None,
            });
        }
        serde_json::from_value(value)
            .map_err(|e| PalaceError::malformed("significance reply has the wrong shape", e))
    }
}
