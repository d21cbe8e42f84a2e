// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use palace_config::GatewayConfig;
use palace_core::PalaceError;

use crate::auth::{AuthConfig, auth_middleware};
use crate::backend::ProactiveBackend;
use crate::channel::ChannelManager;
use crate::handlers;
use crate::ws;

#[derive(Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub channel: Arc<ChannelManager>,
    pub backend: Arc<dyn ProactiveBackend>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(
        channel: Arc<ChannelManager>,
        backend: Arc<dyn ProactiveBackend>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            channel,
            backend,
            auth,
            health: HealthState {
                start_time: std::time::Instant::now(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// 0 binds an ephemeral port.
    pub port: u16,
    /// Served read-only at `/audio`.
    pub audio_dir: PathBuf,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            audio_dir: PathBuf::from(&config.audio_dir),
        }
    }
}

/// Routes:
/// - GET /health (public)
/// - GET /ws (auth during the handshake)
/// - GET /audio/{file} (public, synthesized narration)
/// - POST /v1/analyze, /v1/memories, /v1/respond, /v1/evaluate (bearer)
/// - GET /v1/triggers, /v1/sessions (bearer)
pub fn router(state: GatewayState, audio_dir: &Path) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/ws", get(ws::ws_handler))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/analyze", post(handlers::post_analyze))
        .route("/v1/memories", post(handlers::post_memories))
        .route("/v1/respond", post(handlers::post_respond))
        .route("/v1/evaluate", post(handlers::post_evaluate))
        .route("/v1/triggers", get(handlers::get_triggers))
        .route("/v1/sessions", get(handlers::get_sessions))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// A gateway serving in the background.
pub struct RunningGateway {
    local_addr: SocketAddr,
    channel: Arc<ChannelManager>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl RunningGateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn channel(&self) -> &Arc<ChannelManager> {
        &self.channel
    }

    /// Close every session, then stop the listener.
    pub async fn stop(self) {
        self.channel.stop().await;
        self.shutdown.cancel();
        if tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .is_err()
        {
            tracing::warn!("gateway did not shut down within 5s");
        }
    }
}

/// Bind, start the channel manager and serve until [`RunningGateway::stop`].
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
) -> Result<RunningGateway, PalaceError> {
    let channel = Arc::clone(&state.channel);
    let app = router(state, &config.audio_dir);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PalaceError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| PalaceError::Internal(format!("no local address: {e}")))?;

    channel.start();
    tracing::info!("gateway listening on {local_addr}");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(signal.cancelled_owned())
            .await
        {
            tracing::error!("gateway server error: {e}");
        }
    });

    Ok(RunningGateway {
        local_addr,
        channel,
        shutdown,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_gateway_config() {
        let config = GatewayConfig {
            port: 0,
            audio_dir: "/var/lib/palace/audio".into(),
            ..GatewayConfig::default()
        };
        let server = ServerConfig::from(&config);
        assert_eq!(server.port, 0);
        assert_eq!(server.audio_dir, PathBuf::from("/var/lib/palace/audio"));
    }
}
