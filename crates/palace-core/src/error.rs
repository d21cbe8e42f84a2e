// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Palace proactive memory pipeline.

use thiserror::Error;

use crate::types::{DeliveryState, TriggerId};

/// The primary error type used across all Palace components.
///
/// The first four variants form the pipeline's failure taxonomy. Where a
/// component absorbs a failure locally (the analyzer and the director do),
/// the variant only ever shows up in logs.
#[derive(Debug, Error)]
pub enum PalaceError {
    /// A scoring, narration or synthesis backend is down or timed out.
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Bad or expired token presented during the handshake.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// A frame or collaborator response violated its schema.
    #[error("malformed payload: {message}")]
    MalformedPayload {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A push to a live session was not confirmed in time.
    #[error("delivery to {client_id} timed out after {duration:?}")]
    DeliveryTimeout {
        client_id: String,
        duration: std::time::Duration,
    },

    /// Configuration errors (invalid values, unparsable schedules).
    #[error("configuration error: {0}")]
    Config(String),

    /// A referenced trigger or memory does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A trigger was asked to move to a state its current state forbids.
    #[error("trigger {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: TriggerId,
        from: DeliveryState,
        to: DeliveryState,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PalaceError {
    /// Shorthand for a collaborator failure without an underlying source.
    pub fn unavailable(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        PalaceError::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a schema violation wrapping a serde error.
    pub fn malformed(message: impl Into<String>, source: serde_json::Error) -> Self {
        PalaceError::MalformedPayload {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for failures the pipeline degrades around instead of surfacing.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            PalaceError::CollaboratorUnavailable { .. }
                | PalaceError::MalformedPayload { .. }
                | PalaceError::Timeout { .. }
        )
    }
}
