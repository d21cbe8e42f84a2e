// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Significance scoring collaborator.

use async_trait::async_trait;

use crate::error::PalaceError;
use crate::traits::collaborator::Collaborator;
use crate::types::{Memory, RawSignificance};

/// Classifies a memory. Output is untrusted and validated by the analyzer.
#[async_trait]
pub trait SignificanceScorer: Collaborator {
    /// Score a single memory.
    async fn score(&self, memory: &Memory) -> Result<RawSignificance, PalaceError>;
}
