// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared-secret authentication.
//!
//! The same secret guards the WebSocket handshake and the `/v1` HTTP routes
//! (as `Authorization: Bearer <token>`). With no secret configured every
//! attempt is rejected.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use subtle::ConstantTimeEq;

use palace_core::PalaceError;

#[derive(Clone)]
pub struct AuthConfig {
    /// Expected shared secret. `None` rejects everything.
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl AuthConfig {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Check a presented token against the configured secret.
    pub fn verify(&self, presented: &str) -> Result<(), PalaceError> {
        let Some(expected) = self.token.as_deref() else {
            return Err(PalaceError::AuthFailure(
                "no auth token configured on the server".into(),
            ));
        };
        if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(PalaceError::AuthFailure("invalid token".into()))
        }
    }
}

/// Bearer-token middleware for the HTTP API.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.token.is_none() {
        tracing::error!("gateway has no auth token configured, rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if auth.verify(token).is_ok() => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
