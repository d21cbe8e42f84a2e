// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory and significance fixtures.

use chrono::NaiveDate;

use palace_core::{
    AnalyzedMemory, AnniversaryType, CinematicShow, DirectorResponse, Memory, MemoryId,
    MemoryKind, MemorySnapshot, Person, Scene, SeasonalTag, SignificanceResult,
};

/// Analyzer version used by fixtures.
pub const FIXTURE_VERSION: &str = "test";

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

pub fn memory(id: &str, kind: MemoryKind, title: &str, captured_on: NaiveDate) -> Memory {
    Memory {
        id: MemoryId::from(id),
        kind,
        title: title.to_string(),
        description: format!("{title} with the family."),
        captured_on,
        location: None,
        people: Vec::new(),
        emotion: None,
        content_ref: format!("media/{id}"),
    }
}

pub fn photo(id: &str, title: &str, captured_on: NaiveDate) -> Memory {
    memory(id, MemoryKind::Photo, title, captured_on)
}

pub fn video(id: &str, title: &str, captured_on: NaiveDate) -> Memory {
    memory(id, MemoryKind::Video, title, captured_on)
}

/// A memory with a daughter in it.
pub fn family_photo(id: &str, captured_on: NaiveDate) -> Memory {
    let mut m = photo(id, "Picnic at the lake", captured_on);
    m.people = vec![Person {
        name: "Kate".into(),
        relationship: Some("Daughter".into()),
    }];
    m
}

pub fn significance(
    id: &str,
    anniversary_type: AnniversaryType,
    tags: &[SeasonalTag],
    score: f64,
) -> SignificanceResult {
    SignificanceResult {
        memory_id: MemoryId::from(id),
        anniversary_type,
        seasonal_tags: tags.iter().copied().collect(),
        proactive_score: score,
        reasoning: "fixture".to_string(),
        analyzer_version: FIXTURE_VERSION.to_string(),
        degraded: false,
    }
}

/// Pair a memory with a plain (no life event, no tags) significance.
pub fn analyzed(memory: Memory, score: f64) -> AnalyzedMemory {
    let sig = significance(memory.id.as_str(), AnniversaryType::None, &[], score);
    AnalyzedMemory {
        memory,
        significance: Some(sig),
    }
}

/// A scene for `memory`; audio is attached when `narration_ms` is given.
pub fn scene(memory: &Memory, narration_ms: Option<u64>) -> Scene {
    Scene {
        memory_id: memory.id.clone(),
        narration: format!("Remember {}?", memory.title),
        narration_audio_ref: narration_ms.map(|_| format!("/audio/{}.wav", memory.id)),
        narration_duration_ms: narration_ms,
        memory: MemorySnapshot::from(memory),
    }
}

/// A cinematic response over `scenes`.
pub fn show(title: &str, scenes: Vec<Scene>) -> DirectorResponse {
    DirectorResponse::CinematicShow(
        CinematicShow::new(title, scenes).expect("fixture show needs scenes"),
    )
}
