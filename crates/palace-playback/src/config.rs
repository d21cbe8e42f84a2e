// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Phase timings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Title overlay before each scene.
    pub intro_ms: u64,
    /// Visual transition between scenes.
    pub transition_ms: u64,
    /// Scene hold when neither narration nor media duration is known.
    pub min_scene_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            intro_ms: 2_500,
            transition_ms: 1_000,
            min_scene_ms: 6_000,
        }
    }
}

impl PlaybackConfig {
    pub fn intro(&self) -> Duration {
        Duration::from_millis(self.intro_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn min_scene(&self) -> Duration {
        Duration::from_millis(self.min_scene_ms)
    }
}
