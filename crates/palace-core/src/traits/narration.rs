// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narration writing collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::PalaceError;
use crate::traits::collaborator::Collaborator;
use crate::types::{AnalyzedMemory, MemoryId, PatientContext, TriggerType};

/// Whether a conversation is grounded in memories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationMode {
    Casual,
    #[default]
    MemoryBased,
}

/// Everything a narration writer may ground its text in.
#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub patient: PatientContext,
    /// Memories in narrative order.
    pub memories: Vec<AnalyzedMemory>,
    /// The user's chat message, if this is a conversational request.
    pub message: Option<String>,
    pub mode: ConversationMode,
    /// Set when the request originates from a proactive trigger.
    pub trigger_type: Option<TriggerType>,
}

/// Narration for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneScript {
    pub memory_id: MemoryId,
    pub narration: String,
}

/// Title and per-scene narration for a cinematic show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowScript {
    pub show_title: String,
    pub scenes: Vec<SceneScript>,
}

/// Writes the words the patient hears.
#[async_trait]
pub trait NarrationWriter: Collaborator {
    /// Script a multi-scene show for `request.memories`.
    async fn write_show(&self, request: &NarrationRequest) -> Result<ShowScript, PalaceError>;

    /// Write a single conversational reply.
    async fn write_message(&self, request: &NarrationRequest) -> Result<String, PalaceError>;
}
