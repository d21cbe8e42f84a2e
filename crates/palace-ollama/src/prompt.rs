// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Director prompts.

use std::fmt::Write;

use palace_core::{ConversationMode, MemoryKind, NarrationRequest};
use palace_director::narration::patient_present;

const PREAMBLE: &str = "You are the narrator of 'The Memory Palace', speaking to an elderly \
person living with memory loss. Your tone is warm, gentle, patient and reassuring.";

const RULES: &str = "\
- Base everything ONLY on the memory descriptions and patient notes below.
- When a person's relationship is given in parentheses, as in 'Kate (Daughter)', say 'your daughter, Kate'.
- If a memory description mentions 'you', it means the patient.
- Never invent details that are not in the descriptions.";

/// What the model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    Show,
    Message,
}

pub fn director_prompt(request: &NarrationRequest, shape: ReplyShape) -> String {
    let mut prompt = String::from(PREAMBLE);

    prompt.push_str("\n\n--- JSON OUTPUT ---\nAnswer with a single JSON object:\n");
    match shape {
        ReplyShape::Show => prompt.push_str(
            r#"{"show_title": "A title addressing the patient as 'you'", "scenes": [{"memory_id": "exact id", "narration": "text"}]}"#,
        ),
        ReplyShape::Message => prompt.push_str(r#"{"message": "your reply"}"#),
    }

    if request.mode == ConversationMode::Casual {
        prompt.push_str(
            "\n\n--- CASUAL CONVERSATION ---\nNo memories are involved. Be a friendly companion: \
             ask how they are feeling or what they would like to talk about.",
        );
    }

    prompt.push_str("\n\n--- RULES ---\n");
    prompt.push_str(RULES);
    if shape == ReplyShape::Show {
        prompt.push_str(
            "\n- Use every memory_id below exactly once, in the order given.\
             \n- Keep narration for videos to one short sentence.",
        );
    }

    let patient = &request.patient;
    if !patient.name.trim().is_empty() {
        let _ = write!(prompt, "\n\n--- PATIENT ---\nName: {}", patient.name);
        if let Some(age) = patient.age {
            let _ = write!(prompt, "\nAge: {age}");
        }
        if !patient.description.trim().is_empty() {
            let _ = write!(prompt, "\nNotes: {}", patient.description);
        }
    }

    if request.memories.is_empty() {
        if request.mode != ConversationMode::Casual {
            prompt.push_str("\n\n--- MEMORIES ---\nNo related memories were found.");
        }
    } else {
        prompt.push_str("\n\n--- MEMORIES ---");
        for (i, analyzed) in request.memories.iter().enumerate() {
            let m = &analyzed.memory;
            let _ = write!(
                prompt,
                "\nMemory {} (ID: {}, {}, {}): {}\n{}",
                i + 1,
                m.id,
                m.kind,
                m.captured_on.format("%B %-d, %Y"),
                m.title,
                m.description.trim()
            );
            if !m.people.is_empty() {
                let people: Vec<String> = m.people.iter().map(|p| p.label()).collect();
                let _ = write!(prompt, "\nPeople: {}", people.join(", "));
            }
            if !patient.name.trim().is_empty() {
                if patient_present(m, patient) {
                    let _ = write!(
                        prompt,
                        "\nThe patient, {}, is in this memory: call them \"you\".",
                        patient.name
                    );
                } else {
                    prompt.push_str("\nThe patient is not in this memory: refer to people by name.");
                }
            }
            if shape == ReplyShape::Show && m.kind == MemoryKind::Video {
                prompt.push_str("\nKEEP THIS NARRATION SHORT.");
            }
        }
    }

    prompt.push_str("\n\n--- RESPOND NOW ---");
    match &request.message {
        Some(message) => {
            let _ = write!(prompt, "\nThe patient said: '{message}'");
        }
        None => prompt.push_str("\nYou are reaching out unprompted to share these memories."),
    }
    prompt
}
