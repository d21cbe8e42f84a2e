// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The proactive pipeline: analyzer, scheduler and director behind one backend.
//!
//! [`Pipeline`] is what the gateway's HTTP surface and the evaluation tick loop
//! call into. An evaluation finds due triggers, attaches a director response
//! to each one and only then hands it to the delivery channel, so a pushed
//! trigger always carries its show.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use palace_config::{PalaceConfig, PatientConfig};
use palace_core::{
    AnalyzedMemory, ClientId, Clock, Collaborator, DirectorResponse, HealthStatus, InMemoryCorpus,
    Memory, MemoryCorpus, MemoryId, NarrationWriter, PalaceError, PatientContext,
    SignificanceResult, SignificanceScorer, SpeechSynthesizer, SystemClock, Trigger,
    TriggerPayload, TriggerStore,
};
use palace_director::{Director, DirectorSettings, RespondRequest};
use palace_gateway::{ChannelManager, EvaluationSummary, ProactiveBackend, PushOutcome, RespondBody};
use palace_ollama::{OllamaClient, OllamaNarrator, OllamaScorer};
use palace_scheduler::{SchedulerSettings, TriggerScheduler};
use palace_significance::SignificanceAnalyzer;
use palace_tts::HttpSynthesizer;

/// Collaborators and settings for a [`Pipeline`].
pub struct PipelineBuilder {
    scorer: Arc<dyn SignificanceScorer>,
    narrator: Option<Arc<dyn NarrationWriter>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    corpus: Arc<dyn MemoryCorpus>,
    clock: Arc<dyn Clock>,
    analyzer_version: String,
    analyzer_timeout: Duration,
    scheduler: SchedulerSettings,
    director: DirectorSettings,
    patient: PatientContext,
    patient_client_id: ClientId,
}

impl PipelineBuilder {
    /// Template narration, display-only scenes, an empty in-memory corpus.
    pub fn new(scorer: Arc<dyn SignificanceScorer>) -> Self {
        Self {
            scorer,
            narrator: None,
            synthesizer: None,
            corpus: Arc::new(InMemoryCorpus::new()),
            clock: Arc::new(SystemClock),
            analyzer_version: "1".to_string(),
            analyzer_timeout: Duration::from_secs(60),
            scheduler: SchedulerSettings::default(),
            director: DirectorSettings::default(),
            patient: PatientContext {
                name: "Friend".to_string(),
                ..PatientContext::default()
            },
            patient_client_id: ClientId::from("patient"),
        }
    }

    /// Wire the Ollama scorer and narrator and, when a speech service is
    /// configured, the HTTP synthesizer writing into the gateway's audio dir.
    pub fn from_config(config: &PalaceConfig) -> Result<Self, PalaceError> {
        let ollama = OllamaClient::from_config(&config.analyzer)?;
        let mut builder = Self::new(Arc::new(OllamaScorer::new(ollama.clone())))
            .with_analyzer(
                config.analyzer.version.clone(),
                Duration::from_secs(config.analyzer.timeout_secs),
            )
            .with_scheduler_settings(SchedulerSettings::from_config(
                &config.scheduler,
                &config.analyzer.version,
            )?)
            .with_director_settings(DirectorSettings::from(&config.director))
            .with_patient(patient_context(&config.patient))
            .with_patient_client_id(ClientId::from(config.gateway.patient_client_id.as_str()));

        if config.director.narrate_with_model {
            builder = builder.with_narrator(Arc::new(OllamaNarrator::new(ollama)));
        }
        if let Some(url) = &config.director.tts_url {
            let synthesizer = HttpSynthesizer::new(
                url.as_str(),
                &config.gateway.audio_dir,
                Duration::from_secs(config.director.synthesis_timeout_secs),
            )?
            .with_retention(config.gateway.audio_retention);
            builder = builder.with_synthesizer(Arc::new(synthesizer));
        }
        Ok(builder)
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarrationWriter>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_corpus(mut self, corpus: Arc<dyn MemoryCorpus>) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_analyzer(mut self, version: impl Into<String>, timeout: Duration) -> Self {
        self.analyzer_version = version.into();
        self.analyzer_timeout = timeout;
        self
    }

    pub fn with_scheduler_settings(mut self, settings: SchedulerSettings) -> Self {
        self.scheduler = settings;
        self
    }

    pub fn with_director_settings(mut self, settings: DirectorSettings) -> Self {
        self.director = settings;
        self
    }

    pub fn with_patient(mut self, patient: PatientContext) -> Self {
        self.patient = patient;
        self
    }

    pub fn with_patient_client_id(mut self, client_id: ClientId) -> Self {
        self.patient_client_id = client_id;
        self
    }

    /// Finish wiring. Triggers are stored in the channel's trigger store.
    pub fn build(self, channel: Arc<ChannelManager>) -> Pipeline {
        let analyzer = SignificanceAnalyzer::new(
            Arc::clone(&self.scorer),
            self.analyzer_version.clone(),
            self.analyzer_timeout,
        )
        .with_cache(Arc::clone(&self.corpus));
        let preview =
            SignificanceAnalyzer::new(self.scorer, self.analyzer_version.clone(), self.analyzer_timeout);

        let mut scheduler_settings = self.scheduler;
        scheduler_settings.analyzer_version = self.analyzer_version;
        let scheduler = TriggerScheduler::new(
            Arc::clone(&self.corpus),
            Arc::clone(channel.store()),
            scheduler_settings,
        );

        let mut director = Director::new(self.director);
        if let Some(narrator) = self.narrator {
            director = director.with_narrator(narrator);
        }
        if let Some(synthesizer) = self.synthesizer {
            director = director.with_synthesizer(synthesizer);
        }

        Pipeline {
            analyzer,
            preview,
            scheduler,
            director,
            channel,
            corpus: self.corpus,
            clock: self.clock,
            patient: self.patient,
            patient_client_id: self.patient_client_id,
            evaluation: Mutex::new(()),
        }
    }
}

pub struct Pipeline {
    /// Caches into the corpus.
    analyzer: SignificanceAnalyzer,
    /// Same scorer, no cache; classifies memories that are not being stored.
    preview: SignificanceAnalyzer,
    scheduler: TriggerScheduler,
    director: Director,
    channel: Arc<ChannelManager>,
    corpus: Arc<dyn MemoryCorpus>,
    clock: Arc<dyn Clock>,
    patient: PatientContext,
    patient_client_id: ClientId,
    /// Held for a whole evaluation, find through push, so triggers reach a
    /// client in creation order even when ticks overlap.
    evaluation: Mutex<()>,
}

impl Pipeline {
    pub fn builder(scorer: Arc<dyn SignificanceScorer>) -> PipelineBuilder {
        PipelineBuilder::new(scorer)
    }

    pub fn corpus(&self) -> &Arc<dyn MemoryCorpus> {
        &self.corpus
    }

    pub fn store(&self) -> &Arc<TriggerStore> {
        self.scheduler.store()
    }

    pub fn channel(&self) -> &Arc<ChannelManager> {
        &self.channel
    }

    pub fn patient(&self) -> &PatientContext {
        &self.patient
    }

    /// Score every corpus memory missing a result for the current analyzer
    /// version. Returns how many were scored.
    pub async fn refresh_corpus(&self) -> usize {
        let scored = self.analyzer.refresh_corpus().await;
        if scored > 0 {
            info!(scored, version = self.analyzer.version(), "corpus re-analyzed");
        }
        scored
    }

    /// Run one scheduler evaluation at the pipeline clock's `now`.
    pub async fn run_evaluation(&self) -> Result<EvaluationSummary, PalaceError> {
        let _running = self.evaluation.lock().await;
        let now = self.clock.now();
        let created = self.scheduler.find_due_triggers(now).await;
        let mut summary = EvaluationSummary::default();

        for trigger in created {
            let request =
                RespondRequest::for_trigger(trigger.trigger_type, self.trigger_memories(&trigger));
            let response = self.director.respond(&request, &self.patient).await;
            self.store().set_director_response(&trigger.id, response)?;

            match self.channel.push(&self.patient_client_id, &trigger.id).await? {
                PushOutcome::Delivered => summary.delivered += 1,
                PushOutcome::Queued => summary.queued += 1,
                PushOutcome::AlreadyDelivered => {}
            }
            if let Some(stored) = self.store().get(&trigger.id) {
                summary.created.push(TriggerPayload::from(&stored));
            }
        }

        debug!(
            created = summary.created.len(),
            delivered = summary.delivered,
            queued = summary.queued,
            "evaluation pushed"
        );
        Ok(summary)
    }

    /// Corpus memories of `trigger` in its relevance order. Memories removed
    /// since the trigger was created are skipped.
    fn trigger_memories(&self, trigger: &Trigger) -> Vec<AnalyzedMemory> {
        trigger
            .memory_ids
            .iter()
            .filter_map(|id| self.analyzed(id))
            .collect()
    }

    fn analyzed(&self, id: &MemoryId) -> Option<AnalyzedMemory> {
        let memory = self.corpus.get(id)?;
        let significance = self.corpus.significance(id, self.analyzer.version());
        Some(AnalyzedMemory {
            memory,
            significance,
        })
    }

    fn collaborators(&self) -> Vec<Arc<dyn Collaborator>> {
        let mut out: Vec<Arc<dyn Collaborator>> =
            vec![Arc::clone(self.analyzer.scorer()) as Arc<dyn Collaborator>];
        out.extend(self.director.collaborators());
        out
    }
}

#[async_trait]
impl ProactiveBackend for Pipeline {
    async fn analyze(&self, memory: Memory) -> Result<SignificanceResult, PalaceError> {
        Ok(self.preview.analyze(&memory).await)
    }

    async fn ingest(&self, memory: Memory) -> Result<SignificanceResult, PalaceError> {
        self.corpus.upsert(memory.clone());
        let result = self.analyzer.analyze(&memory).await;
        info!(
            memory_id = %memory.id,
            score = result.proactive_score,
            anniversary_type = %result.anniversary_type,
            degraded = result.degraded,
            "memory ingested"
        );
        Ok(result)
    }

    async fn respond(&self, body: RespondBody) -> Result<DirectorResponse, PalaceError> {
        let memories = body
            .memory_ids
            .iter()
            .map(|id| {
                self.analyzed(id).ok_or_else(|| PalaceError::NotFound {
                    kind: "memory",
                    id: id.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let request = RespondRequest {
            message: Some(body.message),
            memories,
            mode: body.conversation_type,
            trigger_type: None,
            force_narrative: body.force_narrative,
        };
        Ok(self.director.respond(&request, &self.patient).await)
    }

    async fn evaluate(&self) -> Result<EvaluationSummary, PalaceError> {
        self.run_evaluation().await
    }

    async fn collaborator_health(&self) -> Vec<(String, HealthStatus)> {
        let collaborators = self.collaborators();
        let checks = collaborators.iter().map(|c| async move {
            let status = match c.health_check().await {
                Ok(status) => status,
                Err(e) => {
                    warn!(collaborator = c.name(), error = %e, "health check failed");
                    HealthStatus::Unhealthy(e.to_string())
                }
            };
            (c.name().to_string(), status)
        });
        join_all(checks).await
    }
}

/// Narration context for the configured patient.
pub fn patient_context(config: &PatientConfig) -> PatientContext {
    PatientContext {
        name: config.name.clone(),
        age: config.age,
        description: config.description.clone(),
    }
}
