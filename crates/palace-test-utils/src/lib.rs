// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Palace integration tests.
//!
//! Provides mock collaborators and a gateway harness for fast,
//! deterministic, CI-runnable tests without a model server or TTS service.
//!
//! # Components
//!
//! - [`MockScorer`] - significance scorer with canned per-memory answers
//! - [`MockNarrator`] - narration writer with predictable text
//! - [`MockSynthesizer`] - speech synthesizer that can fail or stall per scene
//! - [`FixedClock`] - settable clock for scheduler tests
//! - [`TestHarness`] - a real gateway on an ephemeral port

pub mod clock;
pub mod fixtures;
pub mod harness;
pub mod mock_narrator;
pub mod mock_scorer;
pub mod mock_synthesizer;

pub use clock::FixedClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_narrator::MockNarrator;
pub use mock_scorer::MockScorer;
pub use mock_synthesizer::MockSynthesizer;
