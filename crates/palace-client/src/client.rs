// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The WebSocket session loop.

use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use palace_core::protocol::{AuthHandshake, EngagementMessage, ServerFrame};
use palace_core::{ClientId, ClientType, EngagementResponse, PalaceError, TriggerId, TriggerPayload};

use crate::backoff::{ReconnectPolicy, Sleeper, TokioSleeper};
use crate::machine::{ConnectionMachine, ConnectionState, DisconnectReason, Next};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Gateway WebSocket endpoint, e.g. `ws://127.0.0.1:3001/ws`.
    pub url: String,
    pub auth_token: String,
    #[serde(default = "default_client_type")]
    pub client_type: ClientType,
    /// Defaults to the client type's name on the server side.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    /// How long to wait for `authenticated` after sending the handshake.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("auth_token", &"[redacted]")
            .field("client_type", &self.client_type)
            .field("client_id", &self.client_id)
            .field("reconnect", &self.reconnect)
            .field("handshake_timeout_ms", &self.handshake_timeout_ms)
            .finish()
    }
}

fn default_client_type() -> ClientType {
    ClientType::Patient
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            client_type: default_client_type(),
            client_id: None,
            reconnect: ReconnectPolicy::default(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }

    fn handshake(&self) -> AuthHandshake {
        AuthHandshake {
            auth_token: self.auth_token.clone(),
            client_type: self.client_type,
            client_id: self.client_id.clone(),
        }
    }
}

/// Connection changes, for the UI's connection indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { client_id: ClientId },
    Disconnected { reason: DisconnectReason },
    Reconnecting { attempt: u32, delay: Duration },
    /// The attempt budget ran out; the client has stopped.
    GaveUp { attempts: u32 },
}

/// Receiving ends handed to the UI layer.
pub struct ClientStreams {
    pub events: mpsc::Receiver<ConnectionEvent>,
    pub triggers: mpsc::Receiver<TriggerPayload>,
}

pub struct DeliveryClient {
    config: ClientConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl DeliveryClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff timer, e.g. with one that records delays.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Start connecting in the background.
    pub fn spawn(self) -> (ClientHandle, ClientStreams) {
        let (events_tx, events) = mpsc::channel(64);
        let (triggers_tx, triggers) = mpsc::channel(64);
        let (engage_tx, engage_rx) = mpsc::channel(64);
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(
            SessionLoop {
                config: self.config,
                sleeper: self.sleeper,
                events: events_tx,
                triggers: triggers_tx,
                engagements: engage_rx,
                pending: VecDeque::new(),
                state: state_tx,
                shutdown: shutdown.clone(),
            }
            .run(),
        );

        (
            ClientHandle {
                engagements: engage_tx,
                state,
                shutdown,
                task,
            },
            ClientStreams { events, triggers },
        )
    }
}

/// Control side of a running client.
pub struct ClientHandle {
    engagements: mpsc::Sender<EngagementMessage>,
    state: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ClientHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Report how the user reacted to a trigger. Sent on the live session,
    /// or on the next one if the client is reconnecting.
    pub async fn send_engagement(
        &self,
        trigger_id: TriggerId,
        response: EngagementResponse,
    ) -> Result<(), PalaceError> {
        self.engagements
            .send(EngagementMessage {
                proactive_id: trigger_id,
                response,
            })
            .await
            .map_err(|_| PalaceError::Internal("delivery client has stopped".into()))
    }

    /// Close the session normally and wait for the loop to finish.
    pub async fn close(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "delivery client task failed");
        }
    }
}

struct SessionLoop {
    config: ClientConfig,
    sleeper: Arc<dyn Sleeper>,
    events: mpsc::Sender<ConnectionEvent>,
    triggers: mpsc::Sender<TriggerPayload>,
    engagements: mpsc::Receiver<EngagementMessage>,
    /// Engagements not yet written to a session; kept across reconnects.
    pending: VecDeque<EngagementMessage>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl SessionLoop {
    async fn run(mut self) {
        let mut machine = ConnectionMachine::new(self.config.reconnect.clone());
        loop {
            self.state.send_replace(machine.connecting());
            let attempt = tokio::select! {
                _ = self.shutdown.cancelled() => Err(DisconnectReason::ClosedByClient),
                result = self.connect() => result,
            };
            let reason = match attempt {
                Ok((socket, client_id)) => {
                    self.state.send_replace(machine.connected());
                    info!(%client_id, "delivery session established");
                    self.emit(ConnectionEvent::Connected { client_id }).await;
                    self.session(socket).await
                }
                Err(reason) => reason,
            };

            let next = machine.disconnected(&reason);
            self.state.send_replace(machine.state());
            info!(%reason, "delivery session ended");
            self.emit(ConnectionEvent::Disconnected { reason }).await;

            match next {
                Next::Retry { attempt, delay } => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
                    self.emit(ConnectionEvent::Reconnecting { attempt, delay })
                        .await;
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
                Next::Stop { exhausted } => {
                    if exhausted {
                        let attempts = self.config.reconnect.max_attempts;
                        warn!(attempts, "giving up on the delivery channel");
                        self.emit(ConnectionEvent::GaveUp { attempts }).await;
                    }
                    break;
                }
            }
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event).await;
    }

    /// Connect, send the handshake and wait for `authenticated`.
    async fn connect(&self) -> Result<(Socket, ClientId), DisconnectReason> {
        let (mut socket, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| DisconnectReason::Lost(e.to_string()))?;

        let handshake = serde_json::to_string(&self.config.handshake())
            .map_err(|e| DisconnectReason::Lost(format!("unserializable handshake: {e}")))?;
        socket
            .send(Message::Text(handshake.into()))
            .await
            .map_err(|e| DisconnectReason::Lost(e.to_string()))?;

        let wait = Duration::from_millis(self.config.handshake_timeout_ms);
        match tokio::time::timeout(wait, await_authenticated(&mut socket)).await {
            Ok(result) => result.map(|client_id| (socket, client_id)),
            Err(_) => Err(DisconnectReason::Lost("no reply to the handshake".into())),
        }
    }

    /// Pump frames until the session ends.
    async fn session(&mut self, socket: Socket) -> DisconnectReason {
        let (mut sink, mut stream) = socket.split();
        if let Err(reason) = send_engagements(&mut sink, &mut self.pending).await {
            return reason;
        }
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: Utf8Bytes::from_static("client closing"),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    let _ = sink.close().await;
                    return DisconnectReason::ClosedByClient;
                }
                Some(engagement) = self.engagements.recv() => {
                    self.pending.push_back(engagement);
                    if let Err(reason) = send_engagements(&mut sink, &mut self.pending).await {
                        return reason;
                    }
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.on_text(&text).await,
                    Some(Ok(Message::Close(frame))) => {
                        return DisconnectReason::from_close_code(frame.map(|f| u16::from(f.code)));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return DisconnectReason::Lost(e.to_string()),
                    None => return DisconnectReason::Lost("connection closed".into()),
                },
            }
        }
    }

    async fn on_text(&self, text: &str) {
        match serde_json::from_str::<ServerFrame>(text) {
            Ok(ServerFrame::ProactiveTrigger(payload)) => {
                debug!(trigger_id = %payload.id, "trigger received");
                let _ = self.triggers.send(payload).await;
            }
            Ok(ServerFrame::Authenticated { .. }) => {
                debug!("duplicate authenticated frame ignored");
            }
            Err(e) => warn!(error = %e, "malformed frame dropped"),
        }
    }
}

/// Write queued engagements in order. One that fails to send stays at the
/// head of the queue for the next session.
async fn send_engagements<S>(
    sink: &mut S,
    pending: &mut VecDeque<EngagementMessage>,
) -> Result<(), DisconnectReason>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(engagement) = pending.front() {
        let text = match serde_json::to_string(engagement) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "unserializable engagement dropped");
                pending.pop_front();
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            warn!(trigger_id = %engagement.proactive_id, error = %e, "engagement kept for the next session");
            return Err(DisconnectReason::Lost(e.to_string()));
        }
        debug!(trigger_id = %engagement.proactive_id, response = %engagement.response, "engagement sent");
        pending.pop_front();
    }
    Ok(())
}

async fn await_authenticated(socket: &mut Socket) -> Result<ClientId, DisconnectReason> {
    while let Some(msg) = socket.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                Ok(ServerFrame::Authenticated { client_id }) => return Ok(client_id),
                Ok(ServerFrame::ProactiveTrigger(payload)) => {
                    warn!(trigger_id = %payload.id, "trigger before authentication ignored");
                }
                Err(e) => warn!(error = %e, "malformed frame dropped"),
            },
            Ok(Message::Close(frame)) => {
                return Err(DisconnectReason::from_close_code(
                    frame.map(|f| u16::from(f.code)),
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(DisconnectReason::Lost(e.to_string())),
        }
    }
    Err(DisconnectReason::Lost("connection closed during handshake".into()))
}
