// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron schedule for the evaluation tick.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use croner::Cron;

use palace_core::PalaceError;

/// Parsed cron expression, evaluated in UTC.
pub struct TickSchedule {
    expression: String,
    cron: Cron,
}

impl std::fmt::Debug for TickSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TickSchedule").field(&self.expression).finish()
    }
}

impl TickSchedule {
    pub fn parse(expression: &str) -> Result<Self, PalaceError> {
        let cron = Cron::from_str(expression).map_err(|e| {
            PalaceError::Config(format!("invalid schedule `{expression}`: {e}"))
        })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First tick strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, PalaceError> {
        self.cron.find_next_occurrence(&after, false).map_err(|e| {
            PalaceError::Config(format!("schedule `{}` has no next tick: {e}", self.expression))
        })
    }
}
