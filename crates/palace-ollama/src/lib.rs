// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama adapters for the scoring and narration collaborators.
//!
//! Both talk to `/api/chat` in JSON mode with streaming disabled. Neither
//! applies fallbacks: errors propagate to the analyzer and the director,
//! which own the degradation policy.

pub mod client;
pub mod narrator;
pub mod prompt;
pub mod scorer;
pub mod types;

pub use client::OllamaClient;
pub use narrator::OllamaNarrator;
pub use scorer::OllamaScorer;
