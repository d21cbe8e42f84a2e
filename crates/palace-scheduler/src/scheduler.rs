// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger selection.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use palace_config::SchedulerConfig;
use palace_core::{
    AnalyzedMemory, ClientId, DeliveryState, EngagementResponse, MarkOutcome, MemoryCorpus,
    MemoryId, MemorySummary, PalaceError, SeasonalTag, Trigger, TriggerId, TriggerStore,
    TriggerType,
};

use crate::calendar::SeasonalCalendar;

/// Trigger types in precedence order. A memory joins at most one per evaluation.
pub const PRECEDENCE: [TriggerType; 3] = [
    TriggerType::OnThisDay,
    TriggerType::Anniversary,
    TriggerType::Seasonal,
];

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// A memory delivered for a trigger type is not re-offered for it within this window.
    pub cooldown: Duration,
    pub max_memories_per_trigger: usize,
    pub anniversary_lead_days: u32,
    /// Offset that turns `now` into the patient's calendar day.
    pub utc_offset: FixedOffset,
    /// Which cached significance results to read.
    pub analyzer_version: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::days(30),
            max_memories_per_trigger: 5,
            anniversary_lead_days: 7,
            utc_offset: Utc.fix(),
            analyzer_version: "1".to_string(),
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(
        config: &SchedulerConfig,
        analyzer_version: &str,
    ) -> Result<Self, PalaceError> {
        let utc_offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            PalaceError::Config(format!(
                "utc_offset_minutes {} is out of range",
                config.utc_offset_minutes
            ))
        })?;
        Ok(Self {
            cooldown: Duration::days(i64::from(config.cooldown_days)),
            max_memories_per_trigger: config.max_memories_per_trigger.max(1),
            anniversary_lead_days: config.anniversary_lead_days,
            utc_offset,
            analyzer_version: analyzer_version.to_string(),
        })
    }
}

/// Decides which memories are due for proactive resurfacing.
///
/// Evaluations are serialized; the trigger store is only written once an
/// evaluation has fully completed.
pub struct TriggerScheduler {
    corpus: Arc<dyn MemoryCorpus>,
    store: Arc<TriggerStore>,
    calendar: SeasonalCalendar,
    settings: SchedulerSettings,
    evaluation: Mutex<()>,
}

impl TriggerScheduler {
    pub fn new(
        corpus: Arc<dyn MemoryCorpus>,
        store: Arc<TriggerStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            corpus,
            store,
            calendar: SeasonalCalendar::default(),
            settings,
            evaluation: Mutex::new(()),
        }
    }

    pub fn with_calendar(mut self, calendar: SeasonalCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn store(&self) -> &Arc<TriggerStore> {
        &self.store
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// The patient's calendar day at `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.settings.utc_offset).date_naive()
    }

    /// Create and store every trigger due at `now`, in precedence order.
    pub async fn find_due_triggers(&self, now: DateTime<Utc>) -> Vec<Trigger> {
        let _guard = self.evaluation.lock().await;

        let today = self.local_date(now);
        let active = self.calendar.active_tags(today);
        let analyzed = self.corpus.analyzed(&self.settings.analyzer_version);
        let mut claimed: HashSet<MemoryId> = HashSet::new();
        let mut drafts = Vec::new();

        for trigger_type in PRECEDENCE {
            let mut matched: Vec<&AnalyzedMemory> = analyzed
                .iter()
                .filter(|m| m.memory.captured_on.year() < today.year())
                .filter(|m| !claimed.contains(&m.memory.id))
                .filter(|m| self.matches(trigger_type, m, today, &active))
                .collect();
            claimed.extend(matched.iter().map(|m| m.memory.id.clone()));

            let outstanding = self.store.outstanding_memories(trigger_type);
            matched.retain(|m| {
                !outstanding.contains(&m.memory.id) && !self.cooling_down(trigger_type, m, now)
            });
            if matched.is_empty() {
                continue;
            }

            matched.sort_by(|a, b| relevance_order(a, b));
            if matched.len() > self.settings.max_memories_per_trigger {
                debug!(
                    %trigger_type,
                    dropped = matched.len() - self.settings.max_memories_per_trigger,
                    "trigger over capacity, dropping lowest-scored memories"
                );
                matched.truncate(self.settings.max_memories_per_trigger);
            }

            drafts.push(self.draft(trigger_type, &matched, today, &active, now));
        }

        let created: Vec<Trigger> = drafts.into_iter().map(|t| self.store.insert(t)).collect();
        info!(
            date = %today,
            triggers = created.len(),
            "trigger evaluation complete"
        );
        created
    }

    /// Mark a trigger delivered. Idempotent.
    pub fn mark_delivered(
        &self,
        trigger_id: &TriggerId,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, PalaceError> {
        self.store.mark_delivered(trigger_id, at)
    }

    /// Record a client's engagement with a delivered trigger.
    pub fn record_engagement(
        &self,
        trigger_id: &TriggerId,
        client_id: Option<ClientId>,
        response: EngagementResponse,
        at: DateTime<Utc>,
    ) -> Result<DeliveryState, PalaceError> {
        self.store.record_engagement(trigger_id, client_id, response, at)
    }

    fn matches(
        &self,
        trigger_type: TriggerType,
        m: &AnalyzedMemory,
        today: NaiveDate,
        active: &BTreeSet<SeasonalTag>,
    ) -> bool {
        let captured = m.memory.captured_on;
        match trigger_type {
            TriggerType::OnThisDay => same_calendar_day(captured, today),
            TriggerType::Anniversary => {
                m.anniversary_type().is_life_event()
                    && days_until_anniversary(captured, today, self.settings.anniversary_lead_days)
                        .is_some()
            }
            TriggerType::Seasonal => m
                .significance
                .as_ref()
                .is_some_and(|s| !s.seasonal_tags.is_disjoint(active)),
        }
    }

    fn cooling_down(
        &self,
        trigger_type: TriggerType,
        m: &AnalyzedMemory,
        now: DateTime<Utc>,
    ) -> bool {
        self.store
            .last_delivered(trigger_type, &m.memory.id)
            .is_some_and(|at| now - at < self.settings.cooldown)
    }

    fn draft(
        &self,
        trigger_type: TriggerType,
        selected: &[&AnalyzedMemory],
        today: NaiveDate,
        active: &BTreeSet<SeasonalTag>,
        now: DateTime<Utc>,
    ) -> Trigger {
        let (title, description) = match trigger_type {
            TriggerType::OnThisDay => on_this_day_text(selected, today),
            TriggerType::Anniversary => {
                anniversary_text(selected, today, self.settings.anniversary_lead_days)
            }
            TriggerType::Seasonal => seasonal_text(selected, active),
        };
        Trigger {
            id: TriggerId::generate(),
            trigger_type,
            memory_ids: selected.iter().map(|m| m.memory.id.clone()).collect(),
            memories: selected.iter().map(|m| MemorySummary::from(&m.memory)).collect(),
            title,
            description,
            created_at: now,
            sequence: 0,
            delivery_state: DeliveryState::Pending,
            director_response: None,
        }
    }
}

/// Narrative relevance: score descending, then most recent capture, then id.
pub fn relevance_order(a: &AnalyzedMemory, b: &AnalyzedMemory) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| b.memory.captured_on.cmp(&a.memory.captured_on))
        .then_with(|| a.memory.id.cmp(&b.memory.id))
}

/// Same month and day. Feb 29 memories surface on Feb 28 in common years.
pub fn same_calendar_day(captured: NaiveDate, day: NaiveDate) -> bool {
    if captured.month() == day.month() && captured.day() == day.day() {
        return true;
    }
    captured.month() == 2
        && captured.day() == 29
        && day.month() == 2
        && day.day() == 28
        && NaiveDate::from_ymd_opt(day.year(), 2, 29).is_none()
}

/// Days (1..=lead) until the next anniversary of `captured`, if within the lead window.
pub fn days_until_anniversary(captured: NaiveDate, today: NaiveDate, lead: u32) -> Option<u32> {
    (1..=lead).find(|&ahead| {
        today
            .checked_add_signed(Duration::days(i64::from(ahead)))
            .is_some_and(|day| day.year() > captured.year() && same_calendar_day(captured, day))
    })
}

fn on_this_day_text(selected: &[&AnalyzedMemory], today: NaiveDate) -> (String, String) {
    let title = "On this day".to_string();
    let description = match selected {
        [only] => {
            let years = today.year() - only.memory.captured_on.year();
            format!(
                "{} {} ago today: {}",
                years,
                if years == 1 { "year" } else { "years" },
                only.memory.title
            )
        }
        many => format!("{} memories from this day in years past", many.len()),
    };
    (title, description)
}

fn anniversary_text(
    selected: &[&AnalyzedMemory],
    today: NaiveDate,
    lead: u32,
) -> (String, String) {
    match selected {
        [only] => {
            let kind = capitalize(&only.anniversary_type().to_string());
            let when = match days_until_anniversary(only.memory.captured_on, today, lead) {
                Some(1) => "tomorrow".to_string(),
                Some(n) => format!("in {n} days"),
                None => "soon".to_string(),
            };
            (
                format!("{kind} anniversary coming up"),
                format!("{} is {when}", only.memory.title),
            )
        }
        many => (
            "Anniversaries coming up".to_string(),
            format!("{} special days in the coming week", many.len()),
        ),
    }
}

fn seasonal_text(
    selected: &[&AnalyzedMemory],
    active: &BTreeSet<SeasonalTag>,
) -> (String, String) {
    // Name the season by the most common matching tag, ties going to the calendar order.
    let tag = active
        .iter()
        .max_by_key(|tag| {
            let hits = selected
                .iter()
                .filter(|m| {
                    m.significance
                        .as_ref()
                        .is_some_and(|s| s.seasonal_tags.contains(*tag))
                })
                .count();
            (hits, std::cmp::Reverse(**tag))
        })
        .map(|tag| humanize(&tag.to_string()))
        .unwrap_or_else(|| "Seasonal".to_string());
    (
        format!("{tag} memories"),
        format!("{} memories from {} seasons past", selected.len(), tag.to_lowercase()),
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn humanize(snake: &str) -> String {
    snake
        .split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn leap_day_memories_surface_on_feb_28() {
        assert!(same_calendar_day(d(2000, 2, 29), d(2025, 2, 28)));
        assert!(!same_calendar_day(d(2000, 2, 29), d(2024, 2, 28)));
        assert!(same_calendar_day(d(2000, 2, 29), d(2024, 2, 29)));
    }

    #[test]
    fn anniversary_lead_window() {
        let wedding = d(1970, 6, 10);
        assert_eq!(days_until_anniversary(wedding, d(2025, 6, 9), 7), Some(1));
        assert_eq!(days_until_anniversary(wedding, d(2025, 6, 3), 7), Some(7));
        assert_eq!(days_until_anniversary(wedding, d(2025, 6, 2), 7), None);
        // The day itself belongs to on-this-day, not anniversary.
        assert_eq!(days_until_anniversary(wedding, d(2025, 6, 10), 7), None);
    }

    #[test]
    fn anniversary_window_crosses_year_end() {
        assert_eq!(days_until_anniversary(d(1980, 1, 2), d(2025, 12, 30), 7), Some(3));
    }

    #[test]
    fn humanize_tags() {
        assert_eq!(humanize("new_year"), "New Year");
        assert_eq!(capitalize("wedding"), "Wedding");
    }
}
