// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech synthesis over HTTP.
//!
//! The synthesis service takes `POST /generate-speech` with `{"text": ...}`
//! and answers with the audio bytes, reporting the clip length in the
//! `X-Audio-Duration-Ms` header. Clips are written to the audio directory
//! the gateway serves at `/audio`. Only the newest clips are kept there.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use palace_core::{
    Collaborator, CollaboratorKind, HealthStatus, PalaceError, SpeechSynthesizer,
    SynthesizedSpeech,
};

/// Header carrying the clip duration in milliseconds.
pub const DURATION_HEADER: &str = "x-audio-duration-ms";

/// URL prefix under which the gateway serves the audio directory.
pub const AUDIO_ROUTE: &str = "/audio";

/// Clips kept in the audio directory unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 500;

const CLIP_EXTENSION: &str = "wav";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    base_url: String,
    audio_dir: PathBuf,
    retention: usize,
}

impl HttpSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        audio_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, PalaceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PalaceError::CollaboratorUnavailable {
                collaborator: "tts".into(),
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            audio_dir: audio_dir.into(),
            retention: DEFAULT_RETENTION,
        })
    }

    /// Keep at most `clips` files in the audio directory. Zero is treated as one.
    pub fn with_retention(mut self, clips: usize) -> Self {
        self.retention = clips.max(1);
        self
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    async fn store(&self, bytes: &[u8]) -> Result<String, PalaceError> {
        tokio::fs::create_dir_all(&self.audio_dir)
            .await
            .map_err(|e| PalaceError::Internal(format!("cannot create audio dir: {e}")))?;
        let file = format!("{}.{CLIP_EXTENSION}", uuid::Uuid::new_v4());
        tokio::fs::write(self.audio_dir.join(&file), bytes)
            .await
            .map_err(|e| PalaceError::Internal(format!("cannot write audio clip: {e}")))?;
        if let Err(e) = self.prune().await {
            warn!(dir = %self.audio_dir.display(), error = %e, "audio pruning failed");
        }
        Ok(format!("{AUDIO_ROUTE}/{file}"))
    }

    /// Remove the oldest clips beyond the retention bound. Returns how many
    /// were removed.
    async fn prune(&self) -> std::io::Result<usize> {
        let mut clips = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.audio_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != CLIP_EXTENSION) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                clips.push((metadata.modified()?, path));
            }
        }
        if clips.len() <= self.retention {
            return Ok(0);
        }

        clips.sort();
        let excess = clips.len() - self.retention;
        for (_, path) in &clips[..excess] {
            tokio::fs::remove_file(path).await?;
        }
        debug!(removed = excess, kept = self.retention, "old audio clips pruned");
        Ok(excess)
    }
}

fn duration_ms(headers: &reqwest::header::HeaderMap) -> Result<u64, PalaceError> {
    headers
        .get(DURATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms.round() as u64)
        .ok_or_else(|| PalaceError::MalformedPayload {
            message: format!("missing or invalid {DURATION_HEADER} header"),
            source: None,
        })
}

#[async_trait]
impl Collaborator for HttpSynthesizer {
    fn name(&self) -> &str {
        "tts"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Synthesizer
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        let url = format!("{}/health", self.base_url);
        Ok(match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => HealthStatus::Healthy,
            Ok(r) => HealthStatus::Degraded(format!("tts returned {}", r.status())),
            Err(e) => HealthStatus::Unhealthy(format!("tts unreachable: {e}")),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, PalaceError> {
        let response = self
            .client
            .post(format!("{}/generate-speech", self.base_url))
            .json(&SpeechRequest { text })
            .send()
            .await
            .map_err(|e| PalaceError::CollaboratorUnavailable {
                collaborator: "tts".into(),
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PalaceError::unavailable(
                "tts",
                format!("tts returned {status}: {body}"),
            ));
        }

        let duration_ms = duration_ms(response.headers())?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PalaceError::CollaboratorUnavailable {
                collaborator: "tts".into(),
                message: format!("failed to read audio body: {e}"),
                source: Some(Box::new(e)),
            })?;
        if bytes.is_empty() {
            return Err(PalaceError::MalformedPayload {
                message: "tts returned an empty clip".into(),
                source: None,
            });
        }

        let audio_ref = self.store(&bytes).await?;
        debug!(%audio_ref, duration_ms, chars = text.len(), "narration synthesized");
        Ok(SynthesizedSpeech {
            audio_ref,
            duration_ms,
        })
    }
}
