// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation of raw scorer output.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde_json::Value;

use palace_core::{AnniversaryType, MemoryId, RawSignificance, SeasonalTag, SignificanceResult};

/// At most this many seasonal tags survive validation.
pub const MAX_SEASONAL_TAGS: usize = 3;

pub const MAX_SCORE: f64 = 5.0;

const NO_REASONING: &str = "No reasoning provided.";

/// Coerce loosely typed scorer output into a well-formed result.
///
/// Never fails: anything outside the vocabularies is dropped and anything
/// non-numeric scores zero.
pub fn validate_raw(
    memory_id: MemoryId,
    raw: RawSignificance,
    analyzer_version: &str,
) -> SignificanceResult {
    SignificanceResult {
        memory_id,
        anniversary_type: anniversary_type(raw.anniversary_type.as_ref()),
        seasonal_tags: seasonal_tags(raw.seasonal_tags.as_ref()),
        proactive_score: score(raw.proactive_score.as_ref()),
        reasoning: reasoning(raw.reasoning.as_ref()),
        analyzer_version: analyzer_version.to_string(),
        degraded: false,
    }
}

fn anniversary_type(value: Option<&Value>) -> AnniversaryType {
    match value {
        Some(Value::String(s)) => {
            let s = s.trim().to_ascii_lowercase();
            if s == "null" || s.is_empty() {
                return AnniversaryType::None;
            }
            AnniversaryType::from_str(&s).unwrap_or_default()
        }
        _ => AnniversaryType::None,
    }
}

fn seasonal_tags(value: Option<&Value>) -> BTreeSet<SeasonalTag> {
    let Some(Value::Array(items)) = value else {
        return BTreeSet::new();
    };
    let mut tags = BTreeSet::new();
    for tag in items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|s| SeasonalTag::from_str(s.trim()).ok())
    {
        if tags.len() == MAX_SEASONAL_TAGS {
            break;
        }
        tags.insert(tag);
    }
    tags
}

fn score(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed.clamp(0.0, MAX_SCORE)
    } else {
        0.0
    }
}

fn reasoning(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => NO_REASONING.to_string(),
    }
}
