// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt used by language-model scorers.

use palace_core::Memory;

const ANALYSIS_PROMPT: &str = r#"You analyze a personal memory for a person living with memory loss and decide whether it is worth bringing up unprompted.

Memory:
- Title: {title}
- Description: {description}
- Type: {kind}
- Date: {date}
- Location: {location}
- People present: {people}

Classify it:
- "anniversary_type": one of work, graduation, birthday, wedding, anniversary, retirement, death, or "null" if it marks no life event.
- "seasonal_tags": up to 3 of christmas, halloween, thanksgiving, new_year, valentines, birthday, vacation, spring, summer, autumn, winter. Use [] if none apply.
- "proactive_score": 0 to 5. 5 for major life events (weddings, graduations, deaths), 3 for holidays and seasonal moments, 1 for casual everyday events, 0 for mundane content. Use intermediate values for intermediate emotional weight.
- "reasoning": one short sentence explaining the score.

Respond with a single JSON object with exactly those keys and nothing else."#;

/// Render the analysis prompt for `memory`.
pub fn analysis_prompt(memory: &Memory) -> String {
    let people = if memory.people.is_empty() {
        "none recorded".to_string()
    } else {
        memory
            .people
            .iter()
            .map(|p| p.label())
            .collect::<Vec<_>>()
            .join(", ")
    };

    ANALYSIS_PROMPT
        .replace("{title}", &memory.title)
        .replace("{description}", non_empty(&memory.description))
        .replace("{kind}", &memory.kind.to_string())
        .replace("{date}", &memory.captured_on.format("%B %-d, %Y").to_string())
        .replace("{location}", memory.location.as_deref().unwrap_or("unknown"))
        .replace("{people}", &people)
}

fn non_empty(s: &str) -> &str {
    if s.trim().is_empty() { "(none)" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_test_utils::fixtures;

    #[test]
    fn prompt_mentions_memory_details() {
        let mut memory = fixtures::family_photo("m1", fixtures::date(1998, 7, 4));
        memory.location = Some("Lake Tahoe".into());
        let prompt = analysis_prompt(&memory);
        assert!(prompt.contains("Picnic at the lake"));
        assert!(prompt.contains("July 4, 1998"));
        assert!(prompt.contains("Lake Tahoe"));
        assert!(prompt.contains("Kate (Daughter)"));
        assert!(prompt.contains("Type: photo"));
    }
}
