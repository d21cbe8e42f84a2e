// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock narration writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use palace_core::{
    Collaborator, CollaboratorKind, HealthStatus, NarrationRequest, NarrationWriter,
    PalaceError, SceneScript, ShowScript,
};

/// Writes "Narration for <title>." per memory and a fixed reply message.
pub struct MockNarrator {
    failing: AtomicBool,
    /// Drop narration for the last memory, to simulate a model that skips one.
    skip_last: bool,
    show_delay: Option<Duration>,
}

impl MockNarrator {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            skip_last: false,
            show_delay: None,
        }
    }

    pub fn failing() -> Self {
        let narrator = Self::new();
        narrator.failing.store(true, Ordering::SeqCst);
        narrator
    }

    pub fn skipping_last(mut self) -> Self {
        self.skip_last = true;
        self
    }

    /// Sleep before scripting a show. Replies stay immediate.
    pub fn with_show_delay(mut self, delay: Duration) -> Self {
        self.show_delay = Some(delay);
        self
    }

    fn check(&self) -> Result<(), PalaceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PalaceError::unavailable("mock-narrator", "narrator is down"));
        }
        Ok(())
    }
}

impl Default for MockNarrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collaborator for MockNarrator {
    fn name(&self) -> &str {
        "mock-narrator"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Narrator
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl NarrationWriter for MockNarrator {
    async fn write_show(&self, request: &NarrationRequest) -> Result<ShowScript, PalaceError> {
        if let Some(delay) = self.show_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        let mut scenes: Vec<SceneScript> = request
            .memories
            .iter()
            .map(|m| SceneScript {
                memory_id: m.memory.id.clone(),
                narration: format!("Narration for {}.", m.memory.title),
            })
            .collect();
        if self.skip_last {
            scenes.pop();
        }
        Ok(ShowScript {
            show_title: "Your mock show".to_string(),
            scenes,
        })
    }

    async fn write_message(&self, request: &NarrationRequest) -> Result<String, PalaceError> {
        self.check()?;
        Ok(match &request.message {
            Some(message) => format!("You said: {message}"),
            None => "Hello there.".to_string(),
        })
    }
}
