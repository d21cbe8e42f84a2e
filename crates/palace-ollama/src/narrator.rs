// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narration through Ollama.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use palace_core::{
    Collaborator, CollaboratorKind, HealthStatus, NarrationRequest, NarrationWriter, PalaceError,
    SceneScript, ShowScript,
};

use crate::client::OllamaClient;
use crate::prompt::{ReplyShape, director_prompt};

/// A model reply may carry a `response_type` tag; it is ignored.
#[derive(Debug, Deserialize)]
struct ShowReply {
    #[serde(default)]
    show_title: String,
    #[serde(default)]
    scenes: Vec<SceneScript>,
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    message: String,
}

#[derive(Debug, Clone)]
pub struct OllamaNarrator {
    client: OllamaClient,
}

impl OllamaNarrator {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collaborator for OllamaNarrator {
    fn name(&self) -> &str {
        "ollama-narrator"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Narrator
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        Ok(self.client.health().await)
    }
}

#[async_trait]
impl NarrationWriter for OllamaNarrator {
    async fn write_show(&self, request: &NarrationRequest) -> Result<ShowScript, PalaceError> {
        let value = self
            .client
            .chat_json(&director_prompt(request, ReplyShape::Show))
            .await?;
        let reply: ShowReply = serde_json::from_value(value)
            .map_err(|e| PalaceError::malformed("show reply has the wrong shape", e))?;

        // Only keep scenes for memories that were actually asked about.
        let known = |id: &palace_core::MemoryId| request.memories.iter().any(|m| &m.memory.id == id);
        let scenes: Vec<SceneScript> = reply.scenes.into_iter().filter(|s| known(&s.memory_id)).collect();
        debug!(
            requested = request.memories.len(),
            returned = scenes.len(),
            "model show script"
        );
        if scenes.is_empty() {
            return Err(PalaceError::MalformedPayload {
                message: "show reply has no usable scenes".into(),
                source: None,
            });
        }
        Ok(ShowScript {
            show_title: reply.show_title,
            scenes,
        })
    }

    async fn write_message(&self, request: &NarrationRequest) -> Result<String, PalaceError> {
        let value = self
            .client
            .chat_json(&director_prompt(request, ReplyShape::Message))
            .await?;
        let reply: MessageReply = serde_json::from_value(value)
            .map_err(|e| PalaceError::malformed("message reply has the wrong shape", e))?;
        Ok(reply.message)
    }
}
