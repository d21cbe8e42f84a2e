// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to stored memories and their cached significance.

use crate::types::{AnalyzedMemory, Memory, MemoryId, SignificanceResult};

/// The memory store as seen by the pipeline.
///
/// Storage schemas are somebody else's problem; this is the narrow view the
/// scheduler and director need.
pub trait MemoryCorpus: Send + Sync + 'static {
    /// Add or replace a memory.
    fn upsert(&self, memory: Memory);

    /// Fetch a memory by id.
    fn get(&self, id: &MemoryId) -> Option<Memory>;

    /// Every memory paired with its significance for `analyzer_version`.
    fn analyzed(&self, analyzer_version: &str) -> Vec<AnalyzedMemory>;

    /// Cached significance for (`id`, `analyzer_version`).
    fn significance(&self, id: &MemoryId, analyzer_version: &str) -> Option<SignificanceResult>;

    /// Cache a significance result under its own analyzer version.
    fn store_significance(&self, result: SignificanceResult);

    /// Number of stored memories.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
