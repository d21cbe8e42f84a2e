// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pipeline operations the HTTP API exposes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use palace_core::{
    ConversationMode, DirectorResponse, HealthStatus, Memory, MemoryId, PalaceError,
    SignificanceResult, TriggerPayload,
};

/// Body of `POST /v1/respond`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RespondBody {
    pub message: String,
    /// Corpus memories to ground the reply in, most relevant first.
    #[serde(default)]
    pub memory_ids: Vec<MemoryId>,
    #[serde(default)]
    pub conversation_type: ConversationMode,
    /// The user is showing a single photo and asking about it.
    #[serde(default)]
    pub force_narrative: bool,
}

/// Outcome of an on-demand evaluation tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub created: Vec<TriggerPayload>,
    pub delivered: usize,
    pub queued: usize,
}

/// Implemented by the agent that wires analyzer, scheduler and director.
#[async_trait]
pub trait ProactiveBackend: Send + Sync + 'static {
    /// Classify a memory without storing it.
    async fn analyze(&self, memory: Memory) -> Result<SignificanceResult, PalaceError>;

    /// Add a memory to the corpus and classify it.
    async fn ingest(&self, memory: Memory) -> Result<SignificanceResult, PalaceError>;

    /// Answer a chat message in the same shape proactive triggers use.
    async fn respond(&self, body: RespondBody) -> Result<DirectorResponse, PalaceError>;

    /// Run one scheduler evaluation and push what it produced.
    async fn evaluate(&self) -> Result<EvaluationSummary, PalaceError>;

    /// Readiness of each external collaborator, by name.
    async fn collaborator_health(&self) -> Vec<(String, HealthStatus)>;
}
