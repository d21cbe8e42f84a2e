// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template narration and the phrasing rules shared with model narrators.
//!
//! Narration speaks to the patient. People are introduced through their
//! relationship ("your daughter, Kate"), and when the patient appears in a
//! memory the narration says "you" instead of naming them.

use async_trait::async_trait;
use chrono::Datelike;

use palace_core::{
    AnalyzedMemory, AnniversaryType, Collaborator, CollaboratorKind, ConversationMode,
    HealthStatus, Memory, MemoryKind, NarrationRequest, NarrationWriter, PalaceError,
    PatientContext, Person, SceneScript, ShowScript, TriggerType,
};

/// Said when nothing better can be produced.
pub const FALLBACK_MESSAGE: &str = "I'm sorry, I had a little trouble organizing my thoughts.";

/// "Kate (Daughter)" becomes "your daughter, Kate".
pub fn person_phrase(person: &Person) -> String {
    match person.relationship.as_deref().map(str::trim) {
        Some(rel) if !rel.is_empty() => format!("your {}, {}", rel.to_lowercase(), person.name),
        _ => person.name.clone(),
    }
}

/// People in the memory other than the patient, joined as natural English.
pub fn people_phrase(memory: &Memory, patient: &PatientContext) -> Option<String> {
    let phrases: Vec<String> = memory
        .people
        .iter()
        .filter(|p| !is_patient(&p.name, patient))
        .map(person_phrase)
        .collect();
    match phrases.as_slice() {
        [] => None,
        [one] => Some(one.clone()),
        [init @ .., last] => Some(format!("{} and {last}", init.join(", "))),
    }
}

/// Whether the patient is in the memory: tagged by name, or the description
/// mentions their name or says "you".
pub fn patient_present(memory: &Memory, patient: &PatientContext) -> bool {
    if memory.people.iter().any(|p| is_patient(&p.name, patient)) {
        return true;
    }
    let name = patient.name.trim().to_lowercase();
    memory
        .description
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(str::to_lowercase)
        .any(|word| word == "you" || word == "your" || (!name.is_empty() && word == name))
}

fn is_patient(name: &str, patient: &PatientContext) -> bool {
    !patient.name.trim().is_empty() && name.trim().eq_ignore_ascii_case(patient.name.trim())
}

/// Trim video narration to its first sentence and at most `max_chars`.
pub fn shorten_for_video(narration: &str, max_chars: usize) -> String {
    let first = match narration.find(['.', '!', '?']) {
        Some(end) => &narration[..=end],
        None => narration,
    };
    let first = first.trim();
    if first.chars().count() <= max_chars {
        return first.to_string();
    }
    let cut: String = first.chars().take(max_chars).collect();
    // Back off to a word boundary when there is one.
    let cut = match cut.rfind(' ') {
        Some(space) if space > 0 => &cut[..space],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end_matches([',', ';', ':']))
}

/// Second-person show title.
pub fn show_title(memories: &[AnalyzedMemory], trigger_type: Option<TriggerType>) -> String {
    let first = memories.first();
    match trigger_type {
        Some(TriggerType::OnThisDay) => "Your memories from this day".to_string(),
        Some(TriggerType::Anniversary) => match first.map(AnalyzedMemory::anniversary_type) {
            Some(kind) if kind.is_life_event() && memories.len() == 1 => {
                format!("Your {kind} anniversary")
            }
            _ => "Your special days".to_string(),
        },
        Some(TriggerType::Seasonal) => {
            let tag = first
                .and_then(|m| m.significance.as_ref())
                .and_then(|s| s.seasonal_tags.iter().next())
                .map(|t| t.to_string().replace('_', " "));
            match tag {
                Some(tag) => format!("Your {tag} memories"),
                None => "Your seasonal memories".to_string(),
            }
        }
        None => match first {
            Some(m) if memories.len() == 1 => format!("Your memory of {}", m.memory.title),
            Some(m) => format!("Your memories of {} and more", m.memory.title),
            None => "Your memories".to_string(),
        },
    }
}

/// Narration for one scene, grounded in the memory and the patient context.
pub fn scene_narration(memory: &Memory, patient: &PatientContext, today_year: i32) -> String {
    let years = today_year - memory.captured_on.year();
    let when = match years {
        n if n <= 0 => format!("from {}", memory.captured_on.format("%B")),
        1 => "one year ago".to_string(),
        n => format!("{n} years ago"),
    };
    let with = people_phrase(memory, patient)
        .map(|p| format!(", with {p}"))
        .unwrap_or_default();
    let lead = if patient_present(memory, patient) {
        format!("Here you are at {}{with}, {when}.", memory.title)
    } else {
        let noun = match memory.kind {
            MemoryKind::Video => "a video of",
            MemoryKind::Audio => "a recording of",
            MemoryKind::Photo | MemoryKind::Text => "a memory of",
        };
        format!("This is {noun} {}{with}, {when}.", memory.title)
    };
    let description = memory.description.trim();
    if description.is_empty() {
        lead
    } else {
        format!("{lead} {description}")
    }
}

fn narrative_message(request: &NarrationRequest) -> String {
    let name = request.patient.name.trim();
    let greeting = if name.is_empty() {
        "It's lovely to talk with you.".to_string()
    } else {
        format!("It's lovely to talk with you, {name}.")
    };
    if request.mode == ConversationMode::Casual {
        return greeting;
    }
    match request.memories.first() {
        None => format!("{greeting} Would you like to look at some of your memories together?"),
        Some(m) => {
            let extra = match m.anniversary_type() {
                AnniversaryType::None => String::new(),
                kind => format!(" What a special {kind} that was."),
            };
            format!(
                "That reminds me of {}. {}{extra}",
                m.memory.title,
                m.memory.description.trim()
            )
            .trim()
            .to_string()
        }
    }
}

/// Deterministic narration built from templates.
///
/// Used when model narration is disabled and as the fallback whenever a model
/// narrator fails or leaves a scene out.
#[derive(Debug, Clone, Copy)]
pub struct TemplateNarrator {
    today_year: i32,
}

impl TemplateNarrator {
    pub fn new(today_year: i32) -> Self {
        Self { today_year }
    }

    pub fn now() -> Self {
        Self::new(chrono::Utc::now().year())
    }

    pub fn script(&self, request: &NarrationRequest) -> ShowScript {
        ShowScript {
            show_title: show_title(&request.memories, request.trigger_type),
            scenes: request
                .memories
                .iter()
                .map(|m| SceneScript {
                    memory_id: m.memory.id.clone(),
                    narration: scene_narration(&m.memory, &request.patient, self.today_year),
                })
                .collect(),
        }
    }

    pub fn message(&self, request: &NarrationRequest) -> String {
        narrative_message(request)
    }
}

#[async_trait]
impl Collaborator for TemplateNarrator {
    fn name(&self) -> &str {
        "template"
    }

    fn kind(&self) -> CollaboratorKind {
        CollaboratorKind::Narrator
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl NarrationWriter for TemplateNarrator {
    async fn write_show(&self, request: &NarrationRequest) -> Result<ShowScript, PalaceError> {
        Ok(self.script(request))
    }

    async fn write_message(&self, request: &NarrationRequest) -> Result<String, PalaceError> {
        Ok(self.message(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_test_utils::fixtures;

    fn patient() -> PatientContext {
        PatientContext {
            name: "Margaret".into(),
            age: Some(82),
            description: String::new(),
        }
    }

    #[test]
    fn relationship_phrasing() {
        let kate = Person {
            name: "Kate".into(),
            relationship: Some("Daughter".into()),
        };
        assert_eq!(person_phrase(&kate), "your daughter, Kate");
        assert_eq!(person_phrase(&Person::named("Bob")), "Bob");
    }

    #[test]
    fn people_phrase_skips_the_patient_and_joins() {
        let mut m = fixtures::family_photo("m1", fixtures::date(1990, 1, 1));
        m.people.push(Person::named("Margaret"));
        m.people.push(Person::named("Bob"));
        assert_eq!(
            people_phrase(&m, &patient()).as_deref(),
            Some("your daughter, Kate and Bob")
        );
    }

    #[test]
    fn presence_by_name_or_you() {
        let mut m = fixtures::photo("m1", "Beach", fixtures::date(1990, 1, 1));
        m.description = "Margaret building a sandcastle".into();
        assert!(patient_present(&m, &patient()));
        m.description = "You and Kate at the pier".into();
        assert!(patient_present(&m, &patient()));
        m.description = "Youthful days at the pier".into();
        assert!(!patient_present(&m, &patient()));
    }

    #[test]
    fn second_person_narration_when_present() {
        let mut m = fixtures::family_photo("m1", fixtures::date(1995, 7, 1));
        m.description = "You taught Kate to swim.".into();
        let text = scene_narration(&m, &patient(), 2025);
        assert!(text.starts_with(
            "Here you are at Picnic at the lake, with your daughter, Kate, 30 years ago."
        ));
        assert!(text.ends_with("You taught Kate to swim."));
    }

    #[test]
    fn third_person_narration_when_absent() {
        let m = fixtures::video("m1", "Kate's recital", fixtures::date(2024, 5, 1));
        let text = scene_narration(&m, &patient(), 2025);
        assert!(text.starts_with("This is a video of Kate's recital, one year ago."));
    }

    #[test]
    fn video_narration_is_one_short_sentence() {
        let long = "Here is the day everyone sang together in the garden. Then it rained.";
        assert_eq!(
            shorten_for_video(long, 200),
            "Here is the day everyone sang together in the garden."
        );
        let short = shorten_for_video(long, 20);
        assert!(short.ends_with("..."));
        assert!(short.chars().count() <= 23);
    }

    #[test]
    fn titles_address_the_patient() {
        let wedding = palace_core::AnalyzedMemory {
            memory: fixtures::photo("w", "Our wedding", fixtures::date(1968, 6, 12)),
            significance: Some(fixtures::significance(
                "w",
                AnniversaryType::Wedding,
                &[],
                5.0,
            )),
        };
        assert_eq!(
            show_title(std::slice::from_ref(&wedding), Some(TriggerType::Anniversary)),
            "Your wedding anniversary"
        );
        assert_eq!(show_title(&[wedding], None), "Your memory of Our wedding");
    }
}
