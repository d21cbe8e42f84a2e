// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The delivery channel, client side.
//!
//! [`DeliveryClient`] keeps one authenticated WebSocket session to the
//! gateway alive. Unexpected disconnects are retried with exponential
//! backoff through the [`ConnectionMachine`]; a deliberate close by either
//! side, or a rejected token, ends the session for good. Connection changes
//! and proactive triggers arrive on separate streams so the UI can show
//! "reconnecting" without touching business payloads.

pub mod backoff;
pub mod client;
pub mod machine;

pub use backoff::{ReconnectPolicy, Sleeper, TokioSleeper};
pub use client::{ClientConfig, ClientHandle, ClientStreams, ConnectionEvent, DeliveryClient};
pub use machine::{ConnectionMachine, ConnectionState, DisconnectReason, Next};
