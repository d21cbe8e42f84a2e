// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The delivery channel, server side.
//!
//! Clients connect over WebSocket at `/ws`, authenticate with the shared
//! secret, and receive proactive triggers as they are pushed. Triggers for
//! clients that are offline wait in a bounded per-client queue and are
//! flushed, in creation order, when the client authenticates again. The same
//! server exposes the pipeline over a small bearer-authenticated HTTP API and
//! serves synthesized narration audio.

pub mod auth;
pub mod backend;
pub mod channel;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use backend::{EvaluationSummary, ProactiveBackend, RespondBody};
pub use channel::{ChannelManager, ChannelSettings, Outbound, PushOutcome, SessionHandle};
pub use palace_core::protocol;
pub use palace_core::protocol::{AuthHandshake, EngagementMessage, ServerFrame};
pub use server::{GatewayState, RunningGateway, ServerConfig, router, start_server};
