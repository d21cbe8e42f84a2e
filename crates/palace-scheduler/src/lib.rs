// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger scheduler.
//!
//! Scans the corpus on each evaluation tick for on-this-day, upcoming
//! anniversary and seasonal matches, groups them into triggers and applies
//! the cooldown and per-trigger cap.

pub mod calendar;
pub mod schedule;
pub mod scheduler;

pub use calendar::{SeasonalCalendar, SeasonalWindow};
pub use schedule::TickSchedule;
pub use scheduler::{SchedulerSettings, TriggerScheduler, relevance_order};
