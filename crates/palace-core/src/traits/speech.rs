// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech synthesis collaborator.

use async_trait::async_trait;

use crate::error::PalaceError;
use crate::traits::collaborator::Collaborator;

/// Audio produced for one narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    /// Locator the client can fetch the audio from.
    pub audio_ref: String,
    /// Exact playback length of the audio.
    pub duration_ms: u64,
}

#[async_trait]
pub trait SpeechSynthesizer: Collaborator {
    /// Turn narration text into audio plus its duration.
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, PalaceError>;
}
