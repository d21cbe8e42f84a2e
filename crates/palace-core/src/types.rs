// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared by the analyzer, scheduler, director and delivery channel.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a stored memory.
    MemoryId
);
string_id!(
    /// Unique identifier for a proactive trigger.
    TriggerId
);
string_id!(
    /// Stable identifier for a connected client device.
    ClientId
);

impl TriggerId {
    /// Generate a fresh random trigger id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Collaborator is fully operational.
    Healthy,
    /// Collaborator is reachable but misbehaving.
    Degraded(String),
    /// Collaborator is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

// --- Memories ---

/// Media modality of a memory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemoryKind {
    Photo,
    Video,
    Audio,
    Text,
}

impl MemoryKind {
    /// Photos and videos carry something to look at during a scene.
    pub fn is_visual(&self) -> bool {
        matches!(self, MemoryKind::Photo | MemoryKind::Video)
    }
}

/// A person associated with a memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    /// Relationship to the patient ("Daughter", "Husband").
    #[serde(default)]
    pub relationship: Option<String>,
}

impl Person {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relationship: None,
        }
    }

    /// "Kate (Daughter)" style label used in prompts.
    pub fn label(&self) -> String {
        match &self.relationship {
            Some(rel) => format!("{} ({rel})", self.name),
            None => self.name.clone(),
        }
    }
}

/// A stored memory. Immutable once created apart from tag edits made elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Day the memory was captured.
    pub captured_on: NaiveDate,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub emotion: Option<String>,
    /// Opaque locator for the media, resolved by the client.
    #[serde(default)]
    pub content_ref: String,
}

/// Facts about the patient used to ground narration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatientContext {
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    /// Free-text caregiver notes.
    #[serde(default)]
    pub description: String,
}

// --- Significance ---

/// Closed vocabulary of life events a memory can commemorate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AnniversaryType {
    Birthday,
    Wedding,
    Graduation,
    Anniversary,
    Retirement,
    Death,
    Work,
    #[default]
    None,
}

impl AnniversaryType {
    /// Anything other than `None` commemorates a life event.
    pub fn is_life_event(&self) -> bool {
        !matches!(self, AnniversaryType::None)
    }

    /// Events that earn the top proactive score.
    pub fn is_major(&self) -> bool {
        matches!(
            self,
            AnniversaryType::Wedding | AnniversaryType::Death | AnniversaryType::Graduation
        )
    }
}

/// Fixed vocabulary of holiday and season tags.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SeasonalTag {
    Christmas,
    Halloween,
    Thanksgiving,
    #[strum(to_string = "new_year", serialize = "new_years", serialize = "new year")]
    NewYear,
    #[strum(to_string = "valentines", serialize = "valentine", serialize = "valentines_day")]
    Valentines,
    Birthday,
    Vacation,
    Spring,
    Summer,
    #[strum(to_string = "autumn", serialize = "fall")]
    Autumn,
    Winter,
}

/// Derived significance classification of a memory.
///
/// Recomputable and cacheable by (memory id, analyzer version); never the
/// authoritative copy of anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub memory_id: MemoryId,
    pub anniversary_type: AnniversaryType,
    pub seasonal_tags: BTreeSet<SeasonalTag>,
    /// Proactive score in [0, 5].
    pub proactive_score: f64,
    pub reasoning: String,
    pub analyzer_version: String,
    /// True when the scoring collaborator failed and defaults were used.
    #[serde(default)]
    pub degraded: bool,
}

impl SignificanceResult {
    /// The fail-closed classification used when scoring is unavailable.
    pub fn fallback(memory_id: MemoryId, analyzer_version: impl Into<String>) -> Self {
        Self {
            memory_id,
            anniversary_type: AnniversaryType::None,
            seasonal_tags: BTreeSet::new(),
            proactive_score: 0.0,
            reasoning: "Analysis failed, using default values.".to_string(),
            analyzer_version: analyzer_version.into(),
            degraded: true,
        }
    }
}

/// Loosely typed scoring output, validated by the analyzer.
///
/// Every field is optional and untyped because the scoring model is free to
/// return garbage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSignificance {
    #[serde(default)]
    pub anniversary_type: Option<serde_json::Value>,
    #[serde(default)]
    pub seasonal_tags: Option<serde_json::Value>,
    #[serde(default)]
    pub proactive_score: Option<serde_json::Value>,
    #[serde(default)]
    pub reasoning: Option<serde_json::Value>,
}

/// A memory paired with its cached significance, if analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedMemory {
    pub memory: Memory,
    pub significance: Option<SignificanceResult>,
}

impl AnalyzedMemory {
    pub fn score(&self) -> f64 {
        self.significance
            .as_ref()
            .map(|s| s.proactive_score)
            .unwrap_or(0.0)
    }

    pub fn anniversary_type(&self) -> AnniversaryType {
        self.significance
            .as_ref()
            .map(|s| s.anniversary_type)
            .unwrap_or_default()
    }
}

// --- Triggers ---

/// Why a trigger was raised.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerType {
    OnThisDay,
    Anniversary,
    Seasonal,
}

/// Delivery lifecycle of a trigger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Queued,
    Delivered,
    Viewed,
    Dismissed,
}

impl DeliveryState {
    /// Pending or queued: not yet in front of the client.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, DeliveryState::Pending | DeliveryState::Queued)
    }

    /// The trigger has been sent at least once.
    pub fn was_delivered(&self) -> bool {
        !self.is_outstanding()
    }
}

/// Minimal render data for a memory inside a trigger payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub id: MemoryId,
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub title: String,
    pub description: String,
}

impl From<&Memory> for MemorySummary {
    fn from(m: &Memory) -> Self {
        Self {
            id: m.id.clone(),
            kind: m.kind,
            title: m.title.clone(),
            description: m.description.clone(),
        }
    }
}

/// A scheduler-identified opportunity to surface one or more memories.
///
/// Only `delivery_state` and `director_response` change after creation, and
/// only through [`crate::TriggerStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub trigger_type: TriggerType,
    /// Insertion order is narrative relevance order.
    pub memory_ids: Vec<MemoryId>,
    /// Render snapshot of `memory_ids`, same order.
    pub memories: Vec<MemorySummary>,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Store-assigned creation sequence; breaks `created_at` ties.
    #[serde(default)]
    pub sequence: u64,
    pub delivery_state: DeliveryState,
    pub director_response: Option<DirectorResponse>,
}

/// Wire shape of a trigger pushed to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub id: TriggerId,
    pub trigger_type: TriggerType,
    pub title: String,
    pub description: String,
    pub memory_count: usize,
    pub created_at: DateTime<Utc>,
    pub memories: Vec<MemorySummary>,
    pub director_response: Option<DirectorResponse>,
}

impl From<&Trigger> for TriggerPayload {
    fn from(t: &Trigger) -> Self {
        Self {
            id: t.id.clone(),
            trigger_type: t.trigger_type,
            title: t.title.clone(),
            description: t.description.clone(),
            memory_count: t.memory_ids.len(),
            created_at: t.created_at,
            memories: t.memories.clone(),
            director_response: t.director_response.clone(),
        }
    }
}

// --- Director responses ---

/// Render data for the memory behind a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub title: String,
    pub content_ref: String,
}

impl From<&Memory> for MemorySnapshot {
    fn from(m: &Memory) -> Self {
        Self {
            kind: m.kind,
            title: m.title.clone(),
            content_ref: m.content_ref.clone(),
        }
    }
}

/// One narrated, media-backed unit within a cinematic show.
///
/// Null audio fields mean "display only, no audio phase".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub memory_id: MemoryId,
    pub narration: String,
    #[serde(default)]
    pub narration_audio_ref: Option<String>,
    #[serde(default)]
    pub narration_duration_ms: Option<u64>,
    pub memory: MemorySnapshot,
}

impl Scene {
    pub fn has_audio(&self) -> bool {
        self.narration_audio_ref.is_some() && self.narration_duration_ms.is_some()
    }
}

/// An ordered, non-empty sequence of scenes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCinematicShow")]
pub struct CinematicShow {
    #[serde(rename = "show_title")]
    title: String,
    scenes: Vec<Scene>,
}

#[derive(Deserialize)]
struct RawCinematicShow {
    show_title: String,
    scenes: Vec<Scene>,
}

impl TryFrom<RawCinematicShow> for CinematicShow {
    type Error = String;

    fn try_from(raw: RawCinematicShow) -> Result<Self, Self::Error> {
        CinematicShow::new(raw.show_title, raw.scenes)
            .ok_or_else(|| "a cinematic show needs at least one scene".to_string())
    }
}

impl CinematicShow {
    /// Build a show; `None` when there are no scenes.
    pub fn new(title: impl Into<String>, scenes: Vec<Scene>) -> Option<Self> {
        if scenes.is_empty() {
            return None;
        }
        Some(Self {
            title: title.into(),
            scenes,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Scenes in narrative order. Renderers must not reorder them.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// The single response shape every renderer handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum DirectorResponse {
    Narrative { message: String },
    CinematicShow(CinematicShow),
}

impl DirectorResponse {
    pub fn narrative(message: impl Into<String>) -> Self {
        DirectorResponse::Narrative {
            message: message.into(),
        }
    }

    pub fn is_cinematic(&self) -> bool {
        matches!(self, DirectorResponse::CinematicShow(_))
    }
}

// --- Clients ---

/// Kind of client on the other end of a delivery channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClientType {
    Patient,
    Caregiver,
}

/// Engagement a client reports back for a delivered trigger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngagementResponse {
    Viewed,
    Dismissed,
    Saved,
}

impl EngagementResponse {
    /// Delivery state a trigger lands in after this engagement.
    pub fn resulting_state(&self) -> DeliveryState {
        match self {
            EngagementResponse::Viewed | EngagementResponse::Saved => DeliveryState::Viewed,
            EngagementResponse::Dismissed => DeliveryState::Dismissed,
        }
    }
}

/// One authenticated connection. Re-created on every reconnect.
#[derive(Clone)]
pub struct ClientSession {
    pub client_id: ClientId,
    pub client_type: ClientType,
    pub auth_token: String,
    pub connected: bool,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("client_id", &self.client_id)
            .field("client_type", &self.client_type)
            .field("auth_token", &"[redacted]")
            .field("connected", &self.connected)
            .field("connected_at", &self.connected_at)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn scene(id: &str) -> Scene {
        Scene {
            memory_id: MemoryId::from(id),
            narration: format!("narration for {id}"),
            narration_audio_ref: None,
            narration_duration_ms: None,
            memory: MemorySnapshot {
                kind: MemoryKind::Photo,
                title: "Beach".into(),
                content_ref: "media/beach.jpg".into(),
            },
        }
    }

    #[test]
    fn cinematic_show_rejects_empty_scenes() {
        assert!(CinematicShow::new("title", vec![]).is_none());
        assert!(CinematicShow::new("title", vec![scene("m1")]).is_some());
    }

    #[test]
    fn director_response_wire_shape() {
        let show = CinematicShow::new("Your summer", vec![scene("m1")]).unwrap();
        let json = serde_json::to_value(DirectorResponse::CinematicShow(show)).unwrap();
        assert_eq!(json["response_type"], "cinematic_show");
        assert_eq!(json["show_title"], "Your summer");
        assert_eq!(json["scenes"][0]["memory_id"], "m1");
        assert!(json["scenes"][0]["narration_audio_ref"].is_null());

        let narrative = serde_json::to_value(DirectorResponse::narrative("hello")).unwrap();
        assert_eq!(narrative["response_type"], "narrative");
        assert_eq!(narrative["message"], "hello");
    }

    #[test]
    fn empty_show_fails_to_deserialize() {
        let json = r#"{"response_type": "cinematic_show", "show_title": "x", "scenes": []}"#;
        assert!(serde_json::from_str::<DirectorResponse>(json).is_err());
    }

    #[test]
    fn seasonal_tag_aliases_parse() {
        assert_eq!(SeasonalTag::from_str("fall").unwrap(), SeasonalTag::Autumn);
        assert_eq!(SeasonalTag::from_str("Christmas").unwrap(), SeasonalTag::Christmas);
        assert_eq!(SeasonalTag::from_str("new_years").unwrap(), SeasonalTag::NewYear);
        assert!(SeasonalTag::from_str("competition").is_err());
    }

    #[test]
    fn anniversary_type_vocabulary() {
        assert_eq!(AnniversaryType::from_str("WEDDING").unwrap(), AnniversaryType::Wedding);
        assert!(AnniversaryType::Death.is_major());
        assert!(!AnniversaryType::Birthday.is_major());
        assert!(!AnniversaryType::None.is_life_event());
    }

    #[test]
    fn engagement_maps_to_delivery_state() {
        assert_eq!(EngagementResponse::Saved.resulting_state(), DeliveryState::Viewed);
        assert_eq!(
            EngagementResponse::Dismissed.resulting_state(),
            DeliveryState::Dismissed
        );
    }

    #[test]
    fn client_session_debug_redacts_token() {
        let now = Utc::now();
        let session = ClientSession {
            client_id: ClientId::from("patient"),
            client_type: ClientType::Patient,
            auth_token: "super-secret".into(),
            connected: true,
            connected_at: now,
            last_seen: now,
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
