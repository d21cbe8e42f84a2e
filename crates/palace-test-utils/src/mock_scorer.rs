// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock significance scorer with per-memory canned answers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use palace_core::{
    Collaborator, CollaboratorKind, HealthStatus, Memory, MemoryId, PalaceError,
    RawSignificance, SignificanceScorer,
};

/// Returns the canned [`RawSignificance`] registered for a memory id, or an
/// empty one. Can be switched into failure mode at any time.
pub struct MockScorer {
    responses: Mutex<HashMap<MemoryId, RawSignificance>>,
    failing: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Register the raw answer for `memory_id`.
    pub fn with_response(mut self, memory_id: &str, raw: RawSignificance) -> Self {
        self.responses
            .get_mut()
            .insert(MemoryId::from(memory_id), raw);
        self
    }

    /// Register a well-formed answer built from JSON.
    pub fn with_json(self, memory_id: &str, value: serde_json::Value) -> Self {
        let raw = serde_json::from_value(value).unwrap_or_default();
        self.with_response(memory_id, raw)
    }

    /// Every call fails with `CollaboratorUnavailable`.
    pub fn failing() -> Self {
        let scorer = Self::new();
        scorer.failing.store(true, Ordering::SeqCst);
        scorer
    }

    /// Sleep before answering, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `score` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collaborator for MockScorer {
    fn name(&self) -> &str {
        "mock-scorer"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Scorer
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("mock failure mode".into()));
        }
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl SignificanceScorer for MockScorer {
    async fn score(&self, memory: &Memory) -> Result<RawSignificance, PalaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PalaceError::unavailable("mock-scorer", "scorer is down"));
        }
        Ok(self
            .responses
            .lock()
            .await
            .get(&memory.id)
            .cloned()
            .unwrap_or_default())
    }
}
