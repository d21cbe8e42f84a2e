// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock speech synthesizer with per-text failure and delay injection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use palace_core::{
    Collaborator, CollaboratorKind, HealthStatus, PalaceError, SpeechSynthesizer,
    SynthesizedSpeech,
};

/// Synthesizes nothing; returns `/audio/mock-<n>.wav` with a fixed duration.
///
/// Texts containing a registered fragment fail or stall, so a test can break
/// exactly one scene of a show.
pub struct MockSynthesizer {
    duration_ms: u64,
    fail_on: Vec<String>,
    stall_on: Vec<(String, Duration)>,
    counter: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            duration_ms: 4_000,
            fail_on: Vec::new(),
            stall_on: Vec::new(),
            counter: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Duration reported for every clip.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Fail any text containing `fragment`.
    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.fail_on.push(fragment.to_string());
        self
    }

    /// Sleep for `delay` on any text containing `fragment`.
    pub fn stall_on(mut self, fragment: &str, delay: Duration) -> Self {
        self.stall_on.push((fragment.to_string(), delay));
        self
    }

    /// Texts received so far, in call order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collaborator for MockSynthesizer {
    fn name(&self) -> &str {
        "mock-synthesizer"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Synthesizer
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, PalaceError> {
        self.requests.lock().await.push(text.to_string());

        if let Some((_, delay)) = self.stall_on.iter().find(|(f, _)| text.contains(f.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_on.iter().any(|f| text.contains(f.as_str())) {
            return Err(PalaceError::unavailable("mock-synthesizer", "synthesis failed"));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(SynthesizedSpeech {
            audio_ref: format!("/audio/mock-{n}.wav"),
            duration_ms: self.duration_ms,
        })
    }
}
