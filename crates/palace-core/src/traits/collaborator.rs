// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait for remote collaborators.

use async_trait::async_trait;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::error::PalaceError;
use crate::types::HealthStatus;

/// Role a collaborator plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorKind {
    Scorer,
    Narrator,
    Synthesizer,
}

/// Identity and health for an out-of-process collaborator.
///
/// Every call into a collaborator is fallible and bounded by a timeout at the
/// call site; implementations should not retry internally for longer than that.
#[async_trait]
pub trait Collaborator: Send + Sync + 'static {
    /// Human-readable name of this collaborator instance.
    fn name(&self) -> &str;

    /// The role this collaborator fills.
    fn kind(&self) -> CollaboratorKind;

    /// Ask the backend whether it is serving.
    async fn health_check(&self) -> Result<HealthStatus, PalaceError>;
}
