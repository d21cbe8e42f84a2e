// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for trigger selection.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use proptest::prelude::*;

use palace_core::{
    AnniversaryType, DeliveryState, EngagementResponse, InMemoryCorpus, Memory, MemoryCorpus,
    MemoryId, SeasonalTag, TriggerStore, TriggerType,
};
use palace_scheduler::{SchedulerSettings, TriggerScheduler};
use palace_test_utils::fixtures::{self, FIXTURE_VERSION};

fn noon(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0).unwrap().and_utc()
}

struct Setup {
    corpus: Arc<InMemoryCorpus>,
    scheduler: TriggerScheduler,
}

fn setup(max: usize) -> Setup {
    let corpus = Arc::new(InMemoryCorpus::new());
    let settings = SchedulerSettings {
        max_memories_per_trigger: max,
        analyzer_version: FIXTURE_VERSION.to_string(),
        ..SchedulerSettings::default()
    };
    let scheduler = TriggerScheduler::new(corpus.clone(), Arc::new(TriggerStore::new()), settings);
    Setup { corpus, scheduler }
}

impl Setup {
    fn add(&self, memory: Memory, anniversary: AnniversaryType, tags: &[SeasonalTag], score: f64) {
        self.corpus.store_significance(fixtures::significance(
            memory.id.as_str(),
            anniversary,
            tags,
            score,
        ));
        self.corpus.upsert(memory);
    }

    fn plain(&self, id: &str, captured: NaiveDate, score: f64) {
        self.add(
            fixtures::photo(id, id, captured),
            AnniversaryType::None,
            &[],
            score,
        );
    }
}

fn ids(trigger: &palace_core::Trigger) -> Vec<&str> {
    trigger.memory_ids.iter().map(MemoryId::as_str).collect()
}

#[tokio::test]
async fn on_this_day_matches_prior_years_only() {
    let s = setup(5);
    s.plain("old", fixtures::date(1995, 5, 14), 1.0);
    s.plain("this-year", fixtures::date(2025, 5, 14), 1.0);
    s.plain("other-day", fixtures::date(1995, 5, 15), 1.0);

    let triggers = s.scheduler.find_due_triggers(noon(fixtures::date(2025, 5, 14))).await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].trigger_type, TriggerType::OnThisDay);
    assert_eq!(ids(&triggers[0]), vec!["old"]);
    assert_eq!(triggers[0].delivery_state, DeliveryState::Pending);
    assert_eq!(triggers[0].description, "30 years ago today: old");
}

#[tokio::test]
async fn cap_drops_lowest_scores_and_orders_by_relevance() {
    let s = setup(2);
    s.plain("low", fixtures::date(1990, 3, 3), 1.0);
    s.plain("high", fixtures::date(1991, 3, 3), 5.0);
    s.plain("mid-old", fixtures::date(1980, 3, 3), 3.0);
    s.plain("mid-new", fixtures::date(2000, 3, 3), 3.0);

    let triggers = s.scheduler.find_due_triggers(noon(fixtures::date(2025, 3, 3))).await;
    assert_eq!(ids(&triggers[0]), vec!["high", "mid-new"]);
}

#[tokio::test]
async fn outstanding_trigger_blocks_duplicates() {
    let s = setup(5);
    s.plain("m1", fixtures::date(1999, 9, 9), 2.0);
    let now = noon(fixtures::date(2025, 9, 9));

    assert_eq!(s.scheduler.find_due_triggers(now).await.len(), 1);
    assert!(s.scheduler.find_due_triggers(now).await.is_empty());
}

#[tokio::test]
async fn cooldown_excludes_recently_delivered_memories() {
    let s = setup(5);
    s.add(
        fixtures::photo("xmas", "Christmas morning", fixtures::date(1985, 12, 25)),
        AnniversaryType::None,
        &[SeasonalTag::Christmas],
        3.0,
    );
    let first = noon(fixtures::date(2025, 12, 2));
    let triggers = s.scheduler.find_due_triggers(first).await;
    assert_eq!(triggers[0].trigger_type, TriggerType::Seasonal);
    s.scheduler.mark_delivered(&triggers[0].id, first).unwrap();

    // Still Christmas season, but inside the 30-day cooldown.
    assert!(
        s.scheduler
            .find_due_triggers(first + Duration::days(10))
            .await
            .is_empty()
    );

    // Christmas Day itself is an on-this-day match, a different trigger type.
    let xmas = s.scheduler.find_due_triggers(noon(fixtures::date(2025, 12, 25))).await;
    assert_eq!(xmas.len(), 1);
    assert_eq!(xmas[0].trigger_type, TriggerType::OnThisDay);
}

#[tokio::test]
async fn cooldown_expires() {
    let s = setup(5);
    s.plain("m1", fixtures::date(2000, 4, 1), 1.0);
    let now = noon(fixtures::date(2024, 4, 1));
    let t = s.scheduler.find_due_triggers(now).await;
    s.scheduler.mark_delivered(&t[0].id, now).unwrap();

    let next_year = s.scheduler.find_due_triggers(noon(fixtures::date(2025, 4, 1))).await;
    assert_eq!(next_year.len(), 1);
}

#[tokio::test]
async fn precedence_places_memory_in_one_trigger() {
    let s = setup(5);
    // Matches on-this-day and the Halloween window.
    s.add(
        fixtures::photo("costume", "Costume party", fixtures::date(1992, 10, 25)),
        AnniversaryType::None,
        &[SeasonalTag::Halloween],
        3.0,
    );
    // Only seasonal.
    s.add(
        fixtures::photo("pumpkin", "Pumpkin carving", fixtures::date(1993, 10, 30)),
        AnniversaryType::None,
        &[SeasonalTag::Halloween],
        3.0,
    );

    let triggers = s.scheduler.find_due_triggers(noon(fixtures::date(2025, 10, 25))).await;
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[0].trigger_type, TriggerType::OnThisDay);
    assert_eq!(ids(&triggers[0]), vec!["costume"]);
    assert_eq!(triggers[1].trigger_type, TriggerType::Seasonal);
    assert_eq!(ids(&triggers[1]), vec!["pumpkin"]);
    assert_eq!(triggers[1].title, "Halloween memories");
}

#[tokio::test]
async fn upcoming_life_event_raises_anniversary() {
    let s = setup(5);
    s.add(
        fixtures::photo("wedding", "Our wedding", fixtures::date(1968, 6, 12)),
        AnniversaryType::Wedding,
        &[],
        5.0,
    );
    s.plain("picnic", fixtures::date(1970, 6, 12), 1.0);

    let triggers = s.scheduler.find_due_triggers(noon(fixtures::date(2025, 6, 9))).await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].trigger_type, TriggerType::Anniversary);
    assert_eq!(ids(&triggers[0]), vec!["wedding"]);
    assert_eq!(triggers[0].title, "Wedding anniversary coming up");
    assert_eq!(triggers[0].description, "Our wedding is in 3 days");
}

#[tokio::test]
async fn utc_offset_defines_the_calendar_day() {
    let corpus = Arc::new(InMemoryCorpus::new());
    corpus.store_significance(fixtures::significance("m1", AnniversaryType::None, &[], 1.0));
    corpus.upsert(fixtures::photo("m1", "m1", fixtures::date(2001, 7, 4)));
    let settings = SchedulerSettings {
        utc_offset: chrono::FixedOffset::west_opt(5 * 3600).unwrap(),
        analyzer_version: FIXTURE_VERSION.to_string(),
        ..SchedulerSettings::default()
    };
    let scheduler = TriggerScheduler::new(corpus, Arc::new(TriggerStore::new()), settings);

    // 02:00 UTC on July 5th is still July 4th at UTC-5.
    let now = fixtures::date(2025, 7, 5).and_hms_opt(2, 0, 0).unwrap().and_utc();
    assert_eq!(scheduler.find_due_triggers(now).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_ticks_do_not_duplicate() {
    let s = Arc::new(setup(5));
    s.plain("m1", fixtures::date(1999, 1, 20), 2.0);
    let now = noon(fixtures::date(2025, 1, 20));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.scheduler.find_due_triggers(now).await.len() })
        })
        .collect();
    let mut total = 0;
    for h in handles {
        total += h.await.unwrap();
    }
    assert_eq!(total, 1);
    assert_eq!(s.scheduler.store().len(), 1);
}

#[tokio::test]
async fn engagement_flows_back_through_the_store() {
    let s = setup(5);
    s.plain("m1", fixtures::date(1999, 2, 2), 2.0);
    let now = noon(fixtures::date(2025, 2, 2));
    let t = s.scheduler.find_due_triggers(now).await.remove(0);
    s.scheduler.mark_delivered(&t.id, now).unwrap();

    let state = s
        .scheduler
        .record_engagement(&t.id, None, EngagementResponse::Dismissed, now)
        .unwrap();
    assert_eq!(state, DeliveryState::Dismissed);
}

fn scheduler_rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn on_this_day_always_contains_matching_memory(
        year in 1950i32..2024,
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let s = setup(5);
        s.plain("m1", fixtures::date(year, month, day), 1.0);
        let now = noon(fixtures::date(2024, month, day));
        let triggers = scheduler_rt().block_on(s.scheduler.find_due_triggers(now));

        let on_this_day: Vec<_> = triggers
            .iter()
            .filter(|t| t.trigger_type == TriggerType::OnThisDay)
            .collect();
        prop_assert_eq!(on_this_day.len(), 1);
        prop_assert!(on_this_day[0].memory_ids.contains(&MemoryId::from("m1")));
    }

    #[test]
    fn triggers_respect_cap_and_score_order(
        scores in proptest::collection::vec(0.0f64..=5.0, 1..20),
        cap in 1usize..8,
    ) {
        let s = setup(cap);
        for (i, score) in scores.iter().enumerate() {
            s.plain(&format!("m{i:02}"), fixtures::date(1960 + i as i32, 8, 15), *score);
        }
        let triggers = scheduler_rt().block_on(s.scheduler.find_due_triggers(noon(fixtures::date(2025, 8, 15))));

        for trigger in &triggers {
            prop_assert!(trigger.memory_ids.len() <= cap);
            let kept: Vec<f64> = trigger
                .memory_ids
                .iter()
                .map(|id| s.corpus.significance(id, FIXTURE_VERSION).unwrap().proactive_score)
                .collect();
            prop_assert!(kept.windows(2).all(|w| w[0] >= w[1]), "not descending: {:?}", kept);

            // Nothing dropped outranks anything kept.
            let min_kept = kept.iter().copied().fold(f64::INFINITY, f64::min);
            let dropped_max = scores
                .iter()
                .enumerate()
                .filter(|(i, _)| !trigger.memory_ids.contains(&MemoryId::from(format!("m{i:02}").as_str())))
                .map(|(_, s)| *s)
                .fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(dropped_max <= min_kept);
        }
    }
}
