// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background evaluation tick.
//!
//! Scores whatever the corpus is missing, then sleeps until the next cron
//! occurrence, evaluates, repeats. A failed evaluation is logged and the next
//! tick tries again.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use palace_config::SchedulerConfig;
use palace_core::{Clock, PalaceError, SystemClock};
use palace_scheduler::TickSchedule;

use crate::pipeline::Pipeline;

pub struct ProactiveLoop {
    pipeline: Arc<Pipeline>,
    schedule: TickSchedule,
    evaluate_on_start: bool,
    clock: Arc<dyn Clock>,
}

impl ProactiveLoop {
    pub fn new(pipeline: Arc<Pipeline>, schedule: TickSchedule) -> Self {
        Self {
            pipeline,
            schedule,
            evaluate_on_start: false,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(pipeline: Arc<Pipeline>, config: &SchedulerConfig) -> Result<Self, PalaceError> {
        let schedule = TickSchedule::parse(&config.schedule)?;
        Ok(Self::new(pipeline, schedule).evaluate_on_start(config.evaluate_on_start))
    }

    pub fn evaluate_on_start(mut self, enabled: bool) -> Self {
        self.evaluate_on_start = enabled;
        self
    }

    /// Clock used to find the next tick.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run until `cancel` fires. Returns the number of evaluations performed.
    ///
    /// The corpus is re-analyzed before the first evaluation, so seeded
    /// memories are never judged without their significance.
    pub async fn run(self, cancel: CancellationToken) -> usize {
        info!(schedule = self.schedule.expression(), "proactive evaluation loop started");
        let mut ticks = 0;

        tokio::select! {
            _ = self.pipeline.refresh_corpus() => {}
            _ = cancel.cancelled() => {
                info!("proactive evaluation loop cancelled during corpus refresh");
                return ticks;
            }
        }

        if self.evaluate_on_start && !cancel.is_cancelled() {
            self.tick().await;
            ticks += 1;
        }

        loop {
            let wait = match self.until_next_tick() {
                Ok(wait) => wait,
                Err(e) => {
                    error!(error = %e, "no further evaluation ticks, stopping loop");
                    break;
                }
            };
            debug!(wait_secs = wait.as_secs(), "sleeping until next evaluation");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.tick().await;
                    ticks += 1;
                }
                _ = cancel.cancelled() => {
                    info!("proactive evaluation loop shutting down");
                    break;
                }
            }
        }
        ticks
    }

    fn until_next_tick(&self) -> Result<Duration, PalaceError> {
        let now = self.clock.now();
        let next = self.schedule.next_after(now)?;
        Ok((next - now).to_std().unwrap_or(Duration::ZERO))
    }

    async fn tick(&self) {
        match self.pipeline.run_evaluation().await {
            Ok(summary) => info!(
                created = summary.created.len(),
                delivered = summary.delivered,
                queued = summary.queued,
                "scheduled evaluation complete"
            ),
            Err(e) => warn!(error = %e, "scheduled evaluation failed, retrying next tick"),
        }
    }
}
