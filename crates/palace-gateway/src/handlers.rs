// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! `GET /health` is public. Everything under `/v1` requires the bearer token.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palace_core::{
    ClientId, ClientType, DirectorResponse, HealthStatus, Memory, PalaceError,
    SignificanceResult, Trigger,
};

use crate::backend::{EvaluationSummary, RespondBody};
use crate::server::GatewayState;

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when every collaborator is, otherwise `degraded`.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub collaborators: BTreeMap<String, CollaboratorHealth>,
    pub connected_clients: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollaboratorHealth {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<HealthStatus> for CollaboratorHealth {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy => Self {
                ready: true,
                detail: None,
            },
            HealthStatus::Degraded(detail) | HealthStatus::Unhealthy(detail) => Self {
                ready: false,
                detail: Some(detail),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub client_id: ClientId,
    pub client_type: ClientType,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`PalaceError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub PalaceError);

impl From<PalaceError> for ApiError {
    fn from(e: PalaceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PalaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            PalaceError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            PalaceError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            PalaceError::CollaboratorUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PalaceError::Timeout { .. } | PalaceError::DeliveryTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            PalaceError::InvalidTransition { .. } => StatusCode::CONFLICT,
            PalaceError::Config(_) | PalaceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let collaborators: BTreeMap<String, CollaboratorHealth> = state
        .backend
        .collaborator_health()
        .await
        .into_iter()
        .map(|(name, status)| (name, CollaboratorHealth::from(status)))
        .collect();
    let all_ready = collaborators.values().all(|c| c.ready);
    Json(HealthResponse {
        status: if all_ready { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        collaborators,
        connected_clients: state.channel.sessions().await.len(),
    })
}

/// POST /v1/analyze
pub async fn post_analyze(
    State(state): State<GatewayState>,
    Json(memory): Json<Memory>,
) -> Result<Json<SignificanceResult>, ApiError> {
    Ok(Json(state.backend.analyze(memory).await?))
}

/// POST /v1/memories
pub async fn post_memories(
    State(state): State<GatewayState>,
    Json(memory): Json<Memory>,
) -> Result<(StatusCode, Json<SignificanceResult>), ApiError> {
    let result = state.backend.ingest(memory).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// POST /v1/respond
pub async fn post_respond(
    State(state): State<GatewayState>,
    Json(body): Json<RespondBody>,
) -> Result<Json<DirectorResponse>, ApiError> {
    Ok(Json(state.backend.respond(body).await?))
}

/// POST /v1/evaluate
pub async fn post_evaluate(
    State(state): State<GatewayState>,
) -> Result<Json<EvaluationSummary>, ApiError> {
    Ok(Json(state.backend.evaluate().await?))
}

/// GET /v1/triggers
pub async fn get_triggers(State(state): State<GatewayState>) -> Json<Vec<Trigger>> {
    Json(state.channel.store().list())
}

/// GET /v1/sessions
pub async fn get_sessions(State(state): State<GatewayState>) -> Json<SessionListResponse> {
    let sessions = state
        .channel
        .sessions()
        .await
        .into_iter()
        .map(|s| SessionInfo {
            client_id: s.client_id,
            client_type: s.client_type,
            connected_at: s.connected_at,
        })
        .collect();
    Json(SessionListResponse { sessions })
}
