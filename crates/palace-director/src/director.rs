// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modality decision and show construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use palace_config::DirectorConfig;
use palace_core::{
    AnalyzedMemory, CinematicShow, Collaborator, ConversationMode, DirectorResponse,
    MemoryKind, MemorySnapshot, NarrationRequest, NarrationWriter, PatientContext, Scene,
    SpeechSynthesizer, TriggerType,
};

use crate::narration::{FALLBACK_MESSAGE, TemplateNarrator, shorten_for_video};

/// Presentation chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Narrative,
    Cinematic,
}

#[derive(Debug, Clone)]
pub struct DirectorSettings {
    /// A single memory at or above this score gets a show.
    pub cinematic_score_threshold: f64,
    /// A single memory below this is low-significance and gets plain narration.
    pub low_significance_threshold: f64,
    /// Bound on each scene's synthesis call.
    pub synthesis_timeout: Duration,
    pub video_narration_max_chars: usize,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            cinematic_score_threshold: 4.0,
            low_significance_threshold: 4.0,
            synthesis_timeout: Duration::from_secs(30),
            video_narration_max_chars: 160,
        }
    }
}

impl From<&DirectorConfig> for DirectorSettings {
    fn from(config: &DirectorConfig) -> Self {
        Self {
            cinematic_score_threshold: config.cinematic_score_threshold,
            low_significance_threshold: config.low_significance(),
            synthesis_timeout: Duration::from_secs(config.synthesis_timeout_secs),
            video_narration_max_chars: config.video_narration_max_chars,
        }
    }
}

/// A query or trigger to respond to.
#[derive(Debug, Clone, Default)]
pub struct RespondRequest {
    /// The user's chat message, if any.
    pub message: Option<String>,
    pub memories: Vec<AnalyzedMemory>,
    pub mode: ConversationMode,
    /// Set for proactive triggers.
    pub trigger_type: Option<TriggerType>,
    /// The user is showing a photo and asking about it; answer in words.
    pub force_narrative: bool,
}

impl RespondRequest {
    pub fn for_trigger(trigger_type: TriggerType, memories: Vec<AnalyzedMemory>) -> Self {
        Self {
            memories,
            trigger_type: Some(trigger_type),
            ..Self::default()
        }
    }

    pub fn chat(message: impl Into<String>, memories: Vec<AnalyzedMemory>) -> Self {
        Self {
            message: Some(message.into()),
            memories,
            ..Self::default()
        }
    }

    pub fn casual(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            mode: ConversationMode::Casual,
            ..Self::default()
        }
    }
}

/// Turns a memory set into a [`DirectorResponse`].
///
/// Never fails. Narrator failures fall back to templates, synthesis failures
/// leave the affected scene display-only.
pub struct Director {
    narrator: Option<Arc<dyn NarrationWriter>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    settings: DirectorSettings,
}

impl Director {
    /// A director that narrates from templates and ships display-only scenes.
    pub fn new(settings: DirectorSettings) -> Self {
        Self {
            narrator: None,
            synthesizer: None,
            settings,
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarrationWriter>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn settings(&self) -> &DirectorSettings {
        &self.settings
    }

    /// Collaborators this director calls, for health reporting.
    pub fn collaborators(&self) -> Vec<Arc<dyn Collaborator>> {
        let mut out: Vec<Arc<dyn Collaborator>> = Vec::new();
        if let Some(n) = &self.narrator {
            out.push(n.clone() as Arc<dyn Collaborator>);
        }
        if let Some(s) = &self.synthesizer {
            out.push(s.clone() as Arc<dyn Collaborator>);
        }
        out
    }

    /// The decision rule.
    pub fn decide(&self, request: &RespondRequest) -> Modality {
        if request.force_narrative || request.mode == ConversationMode::Casual {
            return Modality::Narrative;
        }
        match request.memories.as_slice() {
            [] => Modality::Narrative,
            [only] => {
                let score = only.score();
                if score >= self.settings.cinematic_score_threshold {
                    Modality::Cinematic
                } else if score >= self.settings.low_significance_threshold
                    && only.memory.kind.is_visual()
                {
                    Modality::Cinematic
                } else {
                    Modality::Narrative
                }
            }
            _ => Modality::Cinematic,
        }
    }

    /// Respond to a query or trigger.
    pub async fn respond(
        &self,
        request: &RespondRequest,
        patient: &PatientContext,
    ) -> DirectorResponse {
        let narration = NarrationRequest {
            patient: patient.clone(),
            memories: significance_sorted(&request.memories),
            message: request.message.clone(),
            mode: request.mode,
            trigger_type: request.trigger_type,
        };

        let modality = self.decide(request);
        debug!(?modality, memories = narration.memories.len(), "director decision");
        match modality {
            Modality::Narrative => self.narrative(&narration).await,
            Modality::Cinematic => match self.cinematic(&narration).await {
                Some(show) => DirectorResponse::CinematicShow(show),
                None => {
                    warn!("no scenes survived construction, degrading to narrative");
                    self.narrative(&narration).await
                }
            },
        }
    }

    async fn narrative(&self, request: &NarrationRequest) -> DirectorResponse {
        let templates = TemplateNarrator::now();
        let message = match &self.narrator {
            Some(narrator) => match narrator.write_message(request).await {
                Ok(message) if !message.trim().is_empty() => message,
                Ok(_) => templates.message(request),
                Err(e) => {
                    warn!(narrator = narrator.name(), error = %e, "narration degraded, using template");
                    templates.message(request)
                }
            },
            None => templates.message(request),
        };
        if message.trim().is_empty() {
            return DirectorResponse::narrative(FALLBACK_MESSAGE);
        }
        DirectorResponse::narrative(message)
    }

    async fn cinematic(&self, request: &NarrationRequest) -> Option<CinematicShow> {
        let templates = TemplateNarrator::now();
        let fallback = templates.script(request);

        let script = match &self.narrator {
            Some(narrator) => match narrator.write_show(request).await {
                Ok(script) => Some(script),
                Err(e) => {
                    warn!(narrator = narrator.name(), error = %e, "show narration degraded, using templates");
                    None
                }
            },
            None => None,
        };

        let (title, mut by_memory) = match script {
            Some(script) => {
                let title = if script.show_title.trim().is_empty() {
                    fallback.show_title.clone()
                } else {
                    script.show_title
                };
                let by_memory: HashMap<_, _> = script
                    .scenes
                    .into_iter()
                    .filter(|s| !s.narration.trim().is_empty())
                    .map(|s| (s.memory_id, s.narration))
                    .collect();
                (title, by_memory)
            }
            None => (fallback.show_title.clone(), HashMap::new()),
        };

        // One scene per memory in relevance order; the model may omit or
        // reorder scenes, it never decides the order.
        let scenes: Vec<Scene> = request
            .memories
            .iter()
            .zip(fallback.scenes)
            .map(|(m, template)| {
                let mut narration = by_memory
                    .remove(&m.memory.id)
                    .unwrap_or(template.narration);
                if m.memory.kind == MemoryKind::Video {
                    narration =
                        shorten_for_video(&narration, self.settings.video_narration_max_chars);
                }
                Scene {
                    memory_id: m.memory.id.clone(),
                    narration,
                    narration_audio_ref: None,
                    narration_duration_ms: None,
                    memory: MemorySnapshot::from(&m.memory),
                }
            })
            .collect();

        let scenes = self.attach_audio(scenes).await;
        CinematicShow::new(title, scenes)
    }

    /// Synthesize every scene concurrently. A failed or slow scene keeps its
    /// text and loses its audio; siblings are unaffected.
    async fn attach_audio(&self, scenes: Vec<Scene>) -> Vec<Scene> {
        let Some(synth) = &self.synthesizer else {
            return scenes;
        };
        let timeout = self.settings.synthesis_timeout;
        join_all(scenes.into_iter().map(|mut scene| {
            let synth = Arc::clone(synth);
            async move {
                match tokio::time::timeout(timeout, synth.synthesize(&scene.narration)).await {
                    Ok(Ok(speech)) => {
                        scene.narration_audio_ref = Some(speech.audio_ref);
                        scene.narration_duration_ms = Some(speech.duration_ms);
                    }
                    Ok(Err(e)) => {
                        warn!(memory_id = %scene.memory_id, error = %e, "scene synthesis failed, shipping display-only");
                    }
                    Err(_) => {
                        warn!(memory_id = %scene.memory_id, ?timeout, "scene synthesis timed out, shipping display-only");
                    }
                }
                scene
            }
        }))
        .await
    }
}

/// Stable sort by score, highest first. Ties keep their input order.
fn significance_sorted(memories: &[AnalyzedMemory]) -> Vec<AnalyzedMemory> {
    let mut sorted = memories.to_vec();
    sorted.sort_by(|a, b| b.score().total_cmp(&a.score()));
    sorted
}
