// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fail-closed significance analyzer.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use palace_core::{
    Collaborator, Memory, MemoryCorpus, PalaceError, SignificanceResult, SignificanceScorer,
};

use crate::validate::validate_raw;

/// Concurrent scoring calls during a bulk re-analysis.
const BULK_CONCURRENCY: usize = 4;

/// Classifies memories through a [`SignificanceScorer`].
///
/// Results are cached in the corpus under (memory id, analyzer version) when a
/// corpus is attached. Degraded results are never cached, so the next call
/// retries the scorer.
pub struct SignificanceAnalyzer {
    scorer: Arc<dyn SignificanceScorer>,
    corpus: Option<Arc<dyn MemoryCorpus>>,
    version: String,
    timeout: Duration,
}

impl SignificanceAnalyzer {
    pub fn new(
        scorer: Arc<dyn SignificanceScorer>,
        version: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            scorer,
            corpus: None,
            version: version.into(),
            timeout,
        }
    }

    /// Cache results in `corpus`.
    pub fn with_cache(mut self, corpus: Arc<dyn MemoryCorpus>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scorer(&self) -> &Arc<dyn SignificanceScorer> {
        &self.scorer
    }

    /// Classify `memory`, serving from cache when possible.
    ///
    /// Never fails. A scorer error or timeout yields the fallback result
    /// (`anniversary_type = none`, score 0) with `degraded` set.
    pub async fn analyze(&self, memory: &Memory) -> SignificanceResult {
        if let Some(cached) = self
            .corpus
            .as_ref()
            .and_then(|c| c.significance(&memory.id, &self.version))
        {
            debug!(memory_id = %memory.id, "significance cache hit");
            return cached;
        }

        let result = match self.score(memory).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    memory_id = %memory.id,
                    scorer = self.scorer.name(),
                    error = %e,
                    "significance scoring degraded, using fail-closed default"
                );
                return SignificanceResult::fallback(memory.id.clone(), &self.version);
            }
        };

        if let Some(corpus) = &self.corpus {
            corpus.store_significance(result.clone());
        }
        result
    }

    /// Analyze many memories with bounded concurrency. Output order matches input.
    pub async fn analyze_all(&self, memories: &[Memory]) -> Vec<SignificanceResult> {
        let pending: Vec<_> = memories.iter().map(|m| self.analyze(m)).collect();
        stream::iter(pending)
            .buffered(BULK_CONCURRENCY)
            .collect()
            .await
    }

    /// Analyze every corpus memory that has no result for the current version.
    /// Returns how many were scored.
    pub async fn refresh_corpus(&self) -> usize {
        let Some(corpus) = &self.corpus else {
            return 0;
        };
        let stale: Vec<Memory> = corpus
            .analyzed(&self.version)
            .into_iter()
            .filter(|a| a.significance.is_none())
            .map(|a| a.memory)
            .collect();
        self.analyze_all(&stale).await;
        stale.len()
    }

    async fn score(&self, memory: &Memory) -> Result<SignificanceResult, PalaceError> {
        let raw = tokio::time::timeout(self.timeout, self.scorer.score(memory))
            .await
            .map_err(|_| PalaceError::Timeout {
                duration: self.timeout,
            })??;
        Ok(validate_raw(memory.id.clone(), raw, &self.version))
    }
}
