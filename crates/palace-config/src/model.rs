// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every section rejects unknown keys and every field has a compiled default,
//! so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level Palace configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PalaceConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// The patient the narration addresses.
    #[serde(default)]
    pub patient: PatientConfig,

    /// Delivery channel server.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Significance analyzer and its scoring backend.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Trigger evaluation schedule and selection limits.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Modality thresholds and narration/synthesis backends.
    #[serde(default)]
    pub director: DirectorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "palace".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Facts about the patient used to ground narration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PatientConfig {
    #[serde(default = "default_patient_name")]
    pub name: String,

    #[serde(default)]
    pub age: Option<u32>,

    /// Free-text notes from the caregiver.
    #[serde(default)]
    pub description: String,
}

impl Default for PatientConfig {
    fn default() -> Self {
        Self {
            name: default_patient_name(),
            age: None,
            description: String::new(),
        }
    }
}

fn default_patient_name() -> String {
    "Friend".to_string()
}

/// WebSocket delivery channel and HTTP surface.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Shared secret clients present in the handshake. `None` rejects everyone.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// How long a push waits for the socket write before falling back to the queue.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Per-client offline queue bound; the oldest entry is evicted past it.
    #[serde(default = "default_offline_queue_cap")]
    pub offline_queue_cap: usize,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Sessions silent for longer than this are reaped.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Client id proactive triggers are pushed to.
    #[serde(default = "default_patient_client_id")]
    pub patient_client_id: String,

    /// Directory synthesized narration is written to and served from at `/audio`.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    /// Most clips kept in `audio_dir`; the oldest are removed first.
    #[serde(default = "default_audio_retention")]
    pub audio_retention: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            auth_token: None,
            send_timeout_ms: default_send_timeout_ms(),
            offline_queue_cap: default_offline_queue_cap(),
            ping_interval_secs: default_ping_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            patient_client_id: default_patient_client_id(),
            audio_dir: default_audio_dir(),
            audio_retention: default_audio_retention(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[redacted]"),
            )
            .field("send_timeout_ms", &self.send_timeout_ms)
            .field("offline_queue_cap", &self.offline_queue_cap)
            .field("ping_interval_secs", &self.ping_interval_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("patient_client_id", &self.patient_client_id)
            .field("audio_dir", &self.audio_dir)
            .field("audio_retention", &self.audio_retention)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3001
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

fn default_offline_queue_cap() -> usize {
    100
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_patient_client_id() -> String {
    "patient".to_string()
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

fn default_audio_retention() -> usize {
    500
}

/// Significance analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Part of the significance cache key; bump it to force re-analysis.
    #[serde(default = "default_analyzer_version")]
    pub version: String,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Upper bound on a single scoring call.
    #[serde(default = "default_analyzer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            version: default_analyzer_version(),
            ollama_url: default_ollama_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_analyzer_timeout_secs(),
        }
    }
}

fn default_analyzer_version() -> String {
    "1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "gemma3n:e2b".to_string()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_analyzer_timeout_secs() -> u64 {
    60
}

/// Trigger scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression for the evaluation tick (5 fields, evaluated in UTC).
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// A memory is not re-offered for the same trigger type within this many days.
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,

    #[serde(default = "default_max_memories_per_trigger")]
    pub max_memories_per_trigger: usize,

    /// How many days ahead an anniversary starts being offered.
    #[serde(default = "default_anniversary_lead_days")]
    pub anniversary_lead_days: u32,

    /// Offset from UTC that defines the patient's calendar day.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Run one evaluation immediately at startup.
    #[serde(default)]
    pub evaluate_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_schedule(),
            cooldown_days: default_cooldown_days(),
            max_memories_per_trigger: default_max_memories_per_trigger(),
            anniversary_lead_days: default_anniversary_lead_days(),
            utc_offset_minutes: 0,
            evaluate_on_start: false,
        }
    }
}

fn default_schedule() -> String {
    "0 8 * * *".to_string()
}

fn default_cooldown_days() -> u32 {
    30
}

fn default_max_memories_per_trigger() -> usize {
    5
}

fn default_anniversary_lead_days() -> u32 {
    7
}

/// Director configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorConfig {
    /// A single memory scoring at least this gets a cinematic show.
    #[serde(default = "default_cinematic_score_threshold")]
    pub cinematic_score_threshold: f64,

    /// Single memories below this are "low significance". Defaults to the
    /// cinematic threshold.
    #[serde(default)]
    pub low_significance_threshold: Option<f64>,

    /// Use the language model for narration instead of templates.
    #[serde(default = "default_true")]
    pub narrate_with_model: bool,

    /// Base URL of the speech service. `None` ships display-only scenes.
    #[serde(default)]
    pub tts_url: Option<String>,

    #[serde(default = "default_synthesis_timeout_secs")]
    pub synthesis_timeout_secs: u64,

    /// Narration for video scenes is cut to one sentence and at most this many chars.
    #[serde(default = "default_video_narration_max_chars")]
    pub video_narration_max_chars: usize,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            cinematic_score_threshold: default_cinematic_score_threshold(),
            low_significance_threshold: None,
            narrate_with_model: true,
            tts_url: None,
            synthesis_timeout_secs: default_synthesis_timeout_secs(),
            video_narration_max_chars: default_video_narration_max_chars(),
        }
    }
}

impl DirectorConfig {
    /// Effective low-significance threshold.
    pub fn low_significance(&self) -> f64 {
        self.low_significance_threshold
            .unwrap_or(self.cinematic_score_threshold)
    }
}

fn default_cinematic_score_threshold() -> f64 {
    4.0
}

fn default_synthesis_timeout_secs() -> u64 {
    30
}

fn default_video_narration_max_chars() -> usize {
    160
}
