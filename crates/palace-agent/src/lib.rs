// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring for the proactive memory pipeline.
//!
//! ```text
//!  POST /v1/memories ──> Pipeline::ingest ──> analyzer ──> corpus
//!                                                            │
//!  ProactiveLoop (cron) ──> Pipeline::run_evaluation ──> scheduler
//!                                   │
//!                                   ├─> director (show or narrative)
//!                                   └─> ChannelManager::push ──> patient client
//! ```

pub mod pipeline;
pub mod proactive;
pub mod shutdown;

pub use pipeline::{Pipeline, PipelineBuilder, patient_context};
pub use proactive::ProactiveLoop;
pub use shutdown::install_signal_handler;
