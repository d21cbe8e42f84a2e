// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory files: a JSON array of memories.

use std::path::Path;

use palace_core::{Memory, PalaceError};

pub fn load_memories(path: &Path) -> Result<Vec<Memory>, PalaceError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PalaceError::Internal(format!("cannot read {}: {e}", path.display())))?;
    parse_memories(&content)
        .map_err(|e| PalaceError::malformed(format!("{} is not a memory list", path.display()), e))
}

fn parse_memories(content: &str) -> Result<Vec<Memory>, serde_json::Error> {
    serde_json::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_memory_list() {
        let memories = parse_memories(
            r#"[
                {"id": "m1", "type": "photo", "title": "Our wedding", "captured_on": "1965-06-12"},
                {"id": "m2", "type": "video", "title": "Honeymoon", "captured_on": "1965-06-20",
                 "people": [{"name": "Kate", "relationship": "Daughter"}]}
            ]"#,
        )
        .unwrap();
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[1].people[0].name, "Kate");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_memories(Path::new("/nonexistent/memories.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/memories.json"));
    }

    #[test]
    fn non_list_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.json");
        std::fs::write(&path, r#"{"id": "m1"}"#).unwrap();
        assert!(matches!(
            load_memories(&path),
            Err(PalaceError::MalformedPayload { .. })
        ));
    }
}
