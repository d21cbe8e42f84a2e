// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process trigger store and memory corpus.
//!
//! The trigger store is the only state shared between the scheduler and the
//! delivery channel. Every state change is a read-modify-write under the
//! DashMap shard lock for that trigger, so a push racing a queue flush can
//! mark a trigger delivered at most once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::PalaceError;
use crate::traits::MemoryCorpus;
use crate::types::{
    AnalyzedMemory, ClientId, DeliveryState, DirectorResponse, EngagementResponse, Memory,
    MemoryId, SignificanceResult, Trigger, TriggerId, TriggerType,
};

/// Result of an attempt to mark a trigger delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// This call performed the transition.
    Applied,
    /// Somebody already did; nothing changed.
    AlreadyDelivered,
}

/// One engagement event reported by a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementRecord {
    pub trigger_id: TriggerId,
    pub client_id: Option<ClientId>,
    pub response: EngagementResponse,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TriggerStore {
    triggers: DashMap<TriggerId, Trigger>,
    next_sequence: AtomicU64,
    /// Last delivery time per (trigger type, memory), the cooldown ledger.
    delivered: DashMap<(TriggerType, MemoryId), DateTime<Utc>>,
    engagements: DashMap<TriggerId, Vec<EngagementRecord>>,
}

impl TriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly created trigger, assigning its creation sequence.
    pub fn insert(&self, mut trigger: Trigger) -> Trigger {
        trigger.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.triggers.insert(trigger.id.clone(), trigger.clone());
        trigger
    }

    pub fn get(&self, id: &TriggerId) -> Option<Trigger> {
        self.triggers.get(id).map(|t| t.value().clone())
    }

    /// All triggers in creation order.
    pub fn list(&self) -> Vec<Trigger> {
        let mut all: Vec<Trigger> = self.triggers.iter().map(|t| t.value().clone()).collect();
        all.sort_by_key(|t| t.sequence);
        all
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Attach the precomputed director response.
    pub fn set_director_response(
        &self,
        id: &TriggerId,
        response: DirectorResponse,
    ) -> Result<(), PalaceError> {
        let mut entry = self.triggers.get_mut(id).ok_or_else(|| not_found(id))?;
        entry.director_response = Some(response);
        Ok(())
    }

    /// Move a pending trigger to `queued`. Returns false when the trigger
    /// was already queued or has been delivered in the meantime.
    pub fn mark_queued(&self, id: &TriggerId) -> Result<bool, PalaceError> {
        let mut entry = self.triggers.get_mut(id).ok_or_else(|| not_found(id))?;
        if entry.delivery_state == DeliveryState::Pending {
            entry.delivery_state = DeliveryState::Queued;
            return Ok(true);
        }
        Ok(false)
    }

    /// Compare-and-set `pending|queued -> delivered`.
    ///
    /// Records every memory of the trigger in the cooldown ledger. Calling it
    /// again is a no-op reporting [`MarkOutcome::AlreadyDelivered`].
    pub fn mark_delivered(
        &self,
        id: &TriggerId,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, PalaceError> {
        let mut entry = self.triggers.get_mut(id).ok_or_else(|| not_found(id))?;
        if entry.delivery_state.was_delivered() {
            return Ok(MarkOutcome::AlreadyDelivered);
        }
        entry.delivery_state = DeliveryState::Delivered;
        for memory_id in &entry.memory_ids {
            self.delivered
                .insert((entry.trigger_type, memory_id.clone()), at);
        }
        Ok(MarkOutcome::Applied)
    }

    /// Apply a client's engagement and append it to the engagement log.
    ///
    /// An engagement for a trigger still marked outstanding proves the frame
    /// reached the client, so the trigger is marked delivered first.
    pub fn record_engagement(
        &self,
        id: &TriggerId,
        client_id: Option<ClientId>,
        response: EngagementResponse,
        at: DateTime<Utc>,
    ) -> Result<DeliveryState, PalaceError> {
        if self.mark_delivered(id, at)? == MarkOutcome::Applied {
            tracing::debug!(trigger_id = %id, "engagement arrived before delivery ack");
        }
        let state = {
            let mut entry = self.triggers.get_mut(id).ok_or_else(|| not_found(id))?;
            entry.delivery_state = response.resulting_state();
            entry.delivery_state
        };
        self.engagements
            .entry(id.clone())
            .or_default()
            .push(EngagementRecord {
                trigger_id: id.clone(),
                client_id,
                response,
                recorded_at: at,
            });
        Ok(state)
    }

    /// Drop a trigger evicted from a full offline queue.
    ///
    /// `queued -> dismissed` without an engagement record or a cooldown
    /// entry, so its memories become eligible for the next evaluation.
    pub fn evict_queued(&self, id: &TriggerId) -> Result<(), PalaceError> {
        let mut entry = self.triggers.get_mut(id).ok_or_else(|| not_found(id))?;
        if entry.delivery_state != DeliveryState::Queued {
            return Err(PalaceError::InvalidTransition {
                id: id.clone(),
                from: entry.delivery_state,
                to: DeliveryState::Dismissed,
            });
        }
        entry.delivery_state = DeliveryState::Dismissed;
        Ok(())
    }

    /// Engagement history for one trigger, oldest first.
    pub fn engagements(&self, id: &TriggerId) -> Vec<EngagementRecord> {
        self.engagements
            .get(id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Memories currently part of a pending or queued trigger of `trigger_type`.
    pub fn outstanding_memories(&self, trigger_type: TriggerType) -> HashSet<MemoryId> {
        self.triggers
            .iter()
            .filter(|t| t.trigger_type == trigger_type && t.delivery_state.is_outstanding())
            .flat_map(|t| t.memory_ids.clone())
            .collect()
    }

    /// When `memory_id` was last delivered as part of a `trigger_type` trigger.
    pub fn last_delivered(
        &self,
        trigger_type: TriggerType,
        memory_id: &MemoryId,
    ) -> Option<DateTime<Utc>> {
        self.delivered
            .get(&(trigger_type, memory_id.clone()))
            .map(|at| *at.value())
    }
}

fn not_found(id: &TriggerId) -> PalaceError {
    PalaceError::NotFound {
        kind: "trigger",
        id: id.to_string(),
    }
}

/// A [`MemoryCorpus`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryCorpus {
    memories: DashMap<MemoryId, Memory>,
    significance: DashMap<(MemoryId, String), SignificanceResult>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus pre-populated with `memories`.
    pub fn with_memories(memories: impl IntoIterator<Item = Memory>) -> Self {
        let corpus = Self::new();
        for memory in memories {
            corpus.upsert(memory);
        }
        corpus
    }
}

impl MemoryCorpus for InMemoryCorpus {
    fn upsert(&self, memory: Memory) {
        self.memories.insert(memory.id.clone(), memory);
    }

    fn get(&self, id: &MemoryId) -> Option<Memory> {
        self.memories.get(id).map(|m| m.value().clone())
    }

    fn analyzed(&self, analyzer_version: &str) -> Vec<AnalyzedMemory> {
        let mut out: Vec<AnalyzedMemory> = self
            .memories
            .iter()
            .map(|m| AnalyzedMemory {
                memory: m.value().clone(),
                significance: self.significance(m.key(), analyzer_version),
            })
            .collect();
        out.sort_by(|a, b| a.memory.id.cmp(&b.memory.id));
        out
    }

    fn significance(&self, id: &MemoryId, analyzer_version: &str) -> Option<SignificanceResult> {
        self.significance
            .get(&(id.clone(), analyzer_version.to_string()))
            .map(|s| s.value().clone())
    }

    fn store_significance(&self, result: SignificanceResult) {
        let key = (result.memory_id.clone(), result.analyzer_version.clone());
        self.significance.insert(key, result);
    }

    fn len(&self) -> usize {
        self.memories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn trigger(id: &str, memories: &[&str]) -> Trigger {
        Trigger {
            id: TriggerId::from(id),
            trigger_type: TriggerType::Anniversary,
            memory_ids: memories.iter().map(|m| MemoryId::from(*m)).collect(),
            memories: vec![],
            title: "t".into(),
            description: "d".into(),
            created_at: Utc::now(),
            sequence: 0,
            delivery_state: DeliveryState::Pending,
            director_response: None,
        }
    }

    #[test]
    fn insert_assigns_increasing_sequence() {
        let store = TriggerStore::new();
        let a = store.insert(trigger("a", &["m1"]));
        let b = store.insert(trigger("b", &["m2"]));
        assert!(a.sequence < b.sequence);
        let ids: Vec<_> = store.list().into_iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn mark_delivered_is_idempotent() {
        let store = TriggerStore::new();
        store.insert(trigger("t1", &["m1", "m2"]));
        let id = TriggerId::from("t1");
        let now = Utc::now();

        assert_eq!(store.mark_delivered(&id, now).unwrap(), MarkOutcome::Applied);
        assert_eq!(
            store.mark_delivered(&id, now).unwrap(),
            MarkOutcome::AlreadyDelivered
        );
        assert_eq!(store.get(&id).unwrap().delivery_state, DeliveryState::Delivered);
        assert_eq!(
            store.last_delivered(TriggerType::Anniversary, &MemoryId::from("m2")),
            Some(now)
        );
        assert!(store
            .last_delivered(TriggerType::Seasonal, &MemoryId::from("m2"))
            .is_none());
    }

    #[test]
    fn concurrent_mark_delivered_applies_once() {
        let store = Arc::new(TriggerStore::new());
        store.insert(trigger("race", &["m1"]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .mark_delivered(&TriggerId::from("race"), Utc::now())
                        .unwrap()
                })
            })
            .collect();
        let applied = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == MarkOutcome::Applied)
            .count();
        assert_eq!(applied, 1);
    }

    #[test]
    fn queued_then_delivered() {
        let store = TriggerStore::new();
        store.insert(trigger("t1", &["m1"]));
        let id = TriggerId::from("t1");
        assert!(store.mark_queued(&id).unwrap());
        assert!(!store.mark_queued(&id).unwrap());
        assert!(store
            .outstanding_memories(TriggerType::Anniversary)
            .contains(&MemoryId::from("m1")));
        store.mark_delivered(&id, Utc::now()).unwrap();
        assert!(!store.mark_queued(&id).unwrap());
        assert!(store.outstanding_memories(TriggerType::Anniversary).is_empty());
    }

    #[test]
    fn eviction_frees_memories_without_cooldown() {
        let store = TriggerStore::new();
        store.insert(trigger("t1", &["m1"]));
        let id = TriggerId::from("t1");
        assert!(matches!(
            store.evict_queued(&id),
            Err(PalaceError::InvalidTransition { .. })
        ));
        store.mark_queued(&id).unwrap();
        store.evict_queued(&id).unwrap();
        assert_eq!(store.get(&id).unwrap().delivery_state, DeliveryState::Dismissed);
        assert!(store.outstanding_memories(TriggerType::Anniversary).is_empty());
        assert!(store
            .last_delivered(TriggerType::Anniversary, &MemoryId::from("m1"))
            .is_none());
        assert!(store.engagements(&id).is_empty());
    }

    #[test]
    fn saved_engagement_lands_in_viewed_and_is_logged() {
        let store = TriggerStore::new();
        store.insert(trigger("t1", &["m1"]));
        let id = TriggerId::from("t1");
        store.mark_delivered(&id, Utc::now()).unwrap();
        let state = store
            .record_engagement(&id, None, EngagementResponse::Saved, Utc::now())
            .unwrap();
        assert_eq!(state, DeliveryState::Viewed);
        let log = store.engagements(&id);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].response, EngagementResponse::Saved);
    }

    #[test]
    fn engagement_on_unknown_trigger_is_not_found() {
        let store = TriggerStore::new();
        let err = store
            .record_engagement(
                &TriggerId::from("nope"),
                None,
                EngagementResponse::Viewed,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, PalaceError::NotFound { .. }));
    }

    #[test]
    fn corpus_caches_significance_per_version() {
        use crate::types::{AnniversaryType, MemoryKind};
        use chrono::NaiveDate;

        let corpus = InMemoryCorpus::with_memories([Memory {
            id: MemoryId::from("m1"),
            kind: MemoryKind::Photo,
            title: "Wedding".into(),
            description: String::new(),
            captured_on: NaiveDate::from_ymd_opt(1970, 6, 1).unwrap(),
            location: None,
            people: vec![],
            emotion: None,
            content_ref: String::new(),
        }]);
        let mut result = SignificanceResult::fallback(MemoryId::from("m1"), "v1");
        result.anniversary_type = AnniversaryType::Wedding;
        corpus.store_significance(result);

        assert!(corpus.significance(&MemoryId::from("m1"), "v1").is_some());
        assert!(corpus.significance(&MemoryId::from("m1"), "v2").is_none());
        let analyzed = corpus.analyzed("v1");
        assert_eq!(analyzed[0].anniversary_type(), AnniversaryType::Wedding);
        assert!(corpus.analyzed("v2")[0].significance.is_none());
    }
}
