// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in seasonal calendar.
//!
//! Each window is an inclusive month/day range that may wrap the year end.
//! Thanksgiving moves every year and is computed per date.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use palace_core::SeasonalTag;

/// Inclusive (month, day) range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalWindow {
    pub tag: SeasonalTag,
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl SeasonalWindow {
    const fn new(tag: SeasonalTag, start: (u32, u32), end: (u32, u32)) -> Self {
        Self { tag, start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        if self.start <= self.end {
            self.start <= md && md <= self.end
        } else {
            md >= self.start || md <= self.end
        }
    }
}

const FIXED_WINDOWS: &[SeasonalWindow] = &[
    SeasonalWindow::new(SeasonalTag::NewYear, (12, 27), (1, 3)),
    SeasonalWindow::new(SeasonalTag::Valentines, (2, 7), (2, 15)),
    SeasonalWindow::new(SeasonalTag::Spring, (3, 20), (6, 20)),
    SeasonalWindow::new(SeasonalTag::Summer, (6, 21), (9, 21)),
    SeasonalWindow::new(SeasonalTag::Vacation, (7, 1), (8, 31)),
    SeasonalWindow::new(SeasonalTag::Autumn, (9, 22), (12, 20)),
    SeasonalWindow::new(SeasonalTag::Halloween, (10, 17), (10, 31)),
    SeasonalWindow::new(SeasonalTag::Christmas, (12, 1), (12, 26)),
    SeasonalWindow::new(SeasonalTag::Winter, (12, 21), (3, 19)),
];

/// Days before Thanksgiving the window opens.
const THANKSGIVING_LEAD_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct SeasonalCalendar {
    windows: Vec<SeasonalWindow>,
    thanksgiving: bool,
}

impl Default for SeasonalCalendar {
    fn default() -> Self {
        Self {
            windows: FIXED_WINDOWS.to_vec(),
            thanksgiving: true,
        }
    }
}

impl SeasonalCalendar {
    /// A calendar with only the given fixed windows.
    pub fn with_windows(windows: Vec<SeasonalWindow>) -> Self {
        Self {
            windows,
            thanksgiving: false,
        }
    }

    /// Tags whose window covers `date`.
    pub fn active_tags(&self, date: NaiveDate) -> BTreeSet<SeasonalTag> {
        let mut tags: BTreeSet<SeasonalTag> = self
            .windows
            .iter()
            .filter(|w| w.contains(date))
            .map(|w| w.tag)
            .collect();
        if self.thanksgiving
            && let Some(day) = thanksgiving(date.year())
            && date <= day
            && date >= day - Duration::days(THANKSGIVING_LEAD_DAYS)
        {
            tags.insert(SeasonalTag::Thanksgiving);
        }
        tags
    }
}

/// Fourth Thursday of November.
pub fn thanksgiving(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4)
}
