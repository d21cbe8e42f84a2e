// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Significance analysis for stored memories.
//!
//! [`SignificanceAnalyzer`] wraps a scoring collaborator, validates whatever
//! it returns against the closed vocabularies and fails closed (no life
//! event, score 0) when the collaborator is down or talks nonsense.

pub mod analyzer;
pub mod prompt;
pub mod validate;

pub use analyzer::SignificanceAnalyzer;
pub use prompt::analysis_prompt;
pub use validate::validate_raw;
