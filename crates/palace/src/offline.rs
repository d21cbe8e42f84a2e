// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `palace analyze` and `palace evaluate`: one-shot runs over a memory file.
//!
//! Both wire the same pipeline `serve` does, against a channel nobody is
//! connected to, so evaluated triggers end up queued and are printed instead.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use palace_agent::{Pipeline, PipelineBuilder};
use palace_config::PalaceConfig;
use palace_core::{Clock, PalaceError, TriggerStore};
use palace_gateway::{AuthConfig, ChannelManager, ChannelSettings, ProactiveBackend};

use crate::memories::load_memories;

/// Evaluation time for `--date`: noon UTC on that day.
struct PinnedClock(DateTime<Utc>);

impl Clock for PinnedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn pipeline(config: &PalaceConfig, date: Option<NaiveDate>) -> Result<Pipeline, PalaceError> {
    let channel = Arc::new(ChannelManager::new(
        Arc::new(TriggerStore::new()),
        AuthConfig::new(config.gateway.auth_token.clone()),
        ChannelSettings::from(&config.gateway),
    ));
    let mut builder = PipelineBuilder::from_config(config)?;
    if let Some(date) = date {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .ok_or_else(|| PalaceError::Internal(format!("no noon on {date}")))?;
        builder = builder.with_clock(Arc::new(PinnedClock(noon.and_utc())));
    }
    Ok(builder.build(channel))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), PalaceError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| PalaceError::Internal(format!("cannot render output: {e}")))?;
    println!("{text}");
    Ok(())
}

pub async fn run_analyze(config: &PalaceConfig, file: &Path) -> Result<(), PalaceError> {
    let memories = load_memories(file)?;
    let pipeline = pipeline(config, None)?;
    for memory in memories {
        let result = pipeline.analyze(memory).await?;
        print_json(&result, false)?;
    }
    Ok(())
}

pub async fn run_evaluate(
    config: &PalaceConfig,
    file: &Path,
    date: Option<NaiveDate>,
) -> Result<(), PalaceError> {
    let memories = load_memories(file)?;
    let pipeline = pipeline(config, date)?;
    let count = memories.len();
    for memory in memories {
        pipeline.ingest(memory).await?;
    }
    info!(memories = count, "corpus loaded");

    let summary = pipeline.run_evaluation().await?;
    print_json(&summary, true)
}
