// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The channel manager: per-client sessions and offline queues.
//!
//! One instance per process. Each client id owns a slot holding at most one
//! live session and a queue of undelivered triggers. All work on a slot
//! (push, flush on attach, detach) runs under that slot's lock, so pushes to
//! one client go out in order while different clients proceed independently.
//! Delivery state lives in the shared [`TriggerStore`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use palace_config::GatewayConfig;
use palace_core::{
    ClientId, ClientSession, DeliveryState, MarkOutcome, PalaceError, Trigger, TriggerId,
    TriggerPayload, TriggerStore,
};

use crate::auth::AuthConfig;
use crate::protocol::{
    AuthHandshake, CLOSE_SHUTDOWN, CLOSE_STALLED, CLOSE_SUPERSEDED, EngagementMessage,
    ServerFrame,
};

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// How long a push waits for the writer to confirm the frame.
    pub send_timeout: Duration,
    /// Per-client offline queue bound; the oldest trigger is evicted first.
    pub offline_queue_cap: usize,
    pub ping_interval: Duration,
    /// Sessions silent for longer than this are closed.
    pub idle_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            offline_queue_cap: 100,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&GatewayConfig> for ChannelSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            offline_queue_cap: config.offline_queue_cap,
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }
}

/// Commands for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    /// Write a text frame; signal `written` once the socket accepted it.
    Frame {
        text: String,
        written: Option<oneshot::Sender<()>>,
    },
    Ping,
    Close { code: u16, reason: String },
}

impl Outbound {
    /// A frame whose sender stopped waiting for confirmation. The push has
    /// already fallen back to the offline queue, so writing it now would
    /// deliver the trigger twice.
    pub fn is_abandoned(&self) -> bool {
        matches!(
            self,
            Outbound::Frame {
                written: Some(written),
                ..
            } if written.is_closed()
        )
    }
}

/// Sending half of one connection's writer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    connection_id: u64,
    client_id: ClientId,
    tx: mpsc::Sender<Outbound>,
    closed: CancellationToken,
}

impl SessionHandle {
    pub fn new(connection_id: u64, client_id: ClientId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            connection_id,
            client_id,
            tx,
            closed: CancellationToken::new(),
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Cancelled once the channel has given up on this connection. The
    /// socket task ends when it fires, even if the close frame cannot be
    /// queued behind a stuck writer.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Send `text` and wait until the writer reports it written.
    ///
    /// A closed writer and a missed deadline both mean the session is gone
    /// as far as delivery is concerned: [`PalaceError::DeliveryTimeout`].
    pub async fn send_confirmed(&self, text: String, timeout: Duration) -> Result<(), PalaceError> {
        let (written_tx, written_rx) = oneshot::channel();
        let send = async {
            self.tx
                .send(Outbound::Frame {
                    text,
                    written: Some(written_tx),
                })
                .await
                .ok()?;
            written_rx.await.ok()
        };
        match tokio::time::timeout(timeout, send).await {
            Ok(Some(())) => Ok(()),
            _ => Err(PalaceError::DeliveryTimeout {
                client_id: self.client_id.to_string(),
                duration: timeout,
            }),
        }
    }

    /// Ask the writer to close the socket and end the connection.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.try_send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
        self.closed.cancel();
    }
}

/// What happened to a pushed trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Written to a live session and marked delivered.
    Delivered,
    /// Held in the client's offline queue.
    Queued,
    /// The trigger had already been delivered; nothing was sent.
    AlreadyDelivered,
}

struct LiveSession {
    session: ClientSession,
    handle: SessionHandle,
}

#[derive(Default)]
struct ClientSlot {
    live: Option<LiveSession>,
    queue: VecDeque<TriggerId>,
}

pub struct ChannelManager {
    store: Arc<TriggerStore>,
    auth: AuthConfig,
    settings: ChannelSettings,
    clients: DashMap<ClientId, Arc<Mutex<ClientSlot>>>,
    next_connection: AtomicU64,
    running: AtomicBool,
}

impl ChannelManager {
    pub fn new(store: Arc<TriggerStore>, auth: AuthConfig, settings: ChannelSettings) -> Self {
        Self {
            store,
            auth,
            settings,
            clients: DashMap::new(),
            next_connection: AtomicU64::new(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<TriggerStore> {
        &self.store
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// Begin accepting sessions.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("delivery channel started");
    }

    /// Stop accepting sessions and close every live one. Queues are kept;
    /// a restarted channel flushes them as clients return.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for slot in self.slots() {
            if let Some(live) = slot.lock().await.live.take() {
                live.handle.close(CLOSE_SHUTDOWN, "server shutting down");
            }
        }
        info!("delivery channel stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::SeqCst)
    }

    /// Validate a handshake and build the session it will bind.
    pub fn authenticate(&self, handshake: &AuthHandshake) -> Result<ClientSession, PalaceError> {
        if !self.is_running() {
            return Err(PalaceError::AuthFailure("channel is not accepting sessions".into()));
        }
        self.auth.verify(&handshake.auth_token)?;
        let now = Utc::now();
        Ok(ClientSession {
            client_id: handshake.resolved_client_id(),
            client_type: handshake.client_type,
            auth_token: handshake.auth_token.clone(),
            connected: false,
            connected_at: now,
            last_seen: now,
        })
    }

    /// Bind an authenticated session and flush its offline queue in creation
    /// order. Returns how many queued triggers were delivered.
    ///
    /// A previous live session for the same client is closed. If a flushed
    /// frame is not confirmed, the rest stays queued, the connection is
    /// closed with [`CLOSE_STALLED`] and the delivery error is returned.
    pub async fn attach(
        &self,
        mut session: ClientSession,
        handle: SessionHandle,
    ) -> Result<usize, PalaceError> {
        let client_id = session.client_id.clone();
        let slot = self.slot(&client_id);
        let mut slot = slot.lock().await;

        if let Some(old) = slot.live.take() {
            debug!(%client_id, "replacing existing session");
            old.handle.close(CLOSE_SUPERSEDED, "replaced by a newer connection");
        }
        session.connected = true;
        info!(%client_id, client_type = %session.client_type, "client session attached");

        let mut queued: Vec<Trigger> = slot
            .queue
            .drain(..)
            .filter_map(|id| self.store.get(&id))
            .filter(|t| t.delivery_state == DeliveryState::Queued)
            .collect();
        queued.sort_by_key(|t| t.sequence);

        let mut flushed = 0;
        let mut pending = queued.into_iter();
        let mut failure = None;
        for trigger in pending.by_ref() {
            match self.send_trigger(&handle, &trigger).await {
                Ok(()) => {
                    if self.store.mark_delivered(&trigger.id, Utc::now())? == MarkOutcome::Applied {
                        flushed += 1;
                    }
                }
                Err(e) => {
                    warn!(%client_id, trigger_id = %trigger.id, error = %e, "flush failed, keeping trigger queued");
                    slot.queue.push_back(trigger.id);
                    failure = Some(e);
                    break;
                }
            }
        }
        slot.queue.extend(pending.map(|t| t.id));

        if flushed > 0 {
            info!(%client_id, flushed, "offline queue flushed");
        }
        if let Some(e) = failure {
            handle.close(CLOSE_STALLED, "delivery not confirmed");
            return Err(e);
        }
        slot.live = Some(LiveSession { session, handle });
        Ok(flushed)
    }

    /// Unbind a connection. Ignored when the slot already belongs to a newer
    /// connection of the same client.
    pub async fn detach(&self, client_id: &ClientId, connection_id: u64) {
        let Some(slot) = self.clients.get(client_id).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let mut slot = slot.lock().await;
        if slot
            .live
            .as_ref()
            .is_some_and(|l| l.handle.connection_id() == connection_id)
        {
            slot.live = None;
            info!(%client_id, "client session detached");
        }
    }

    /// Record inbound activity on a live connection.
    pub async fn touch(&self, client_id: &ClientId, connection_id: u64) {
        let Some(slot) = self.clients.get(client_id).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let mut slot = slot.lock().await;
        if let Some(live) = slot.live.as_mut()
            && live.handle.connection_id() == connection_id
        {
            live.session.last_seen = Utc::now();
        }
    }

    /// Deliver a trigger to a client now, or queue it until they return.
    pub async fn push(
        &self,
        client_id: &ClientId,
        trigger_id: &TriggerId,
    ) -> Result<PushOutcome, PalaceError> {
        let trigger = self.store.get(trigger_id).ok_or_else(|| PalaceError::NotFound {
            kind: "trigger",
            id: trigger_id.to_string(),
        })?;
        if trigger.delivery_state.was_delivered() {
            return Ok(PushOutcome::AlreadyDelivered);
        }

        let slot = self.slot(client_id);
        let mut slot = slot.lock().await;

        if slot.queue.is_empty()
            && let Some(live) = &slot.live
        {
            match self.send_trigger(&live.handle, &trigger).await {
                Ok(()) => {
                    debug!(%client_id, %trigger_id, "trigger pushed");
                    return Ok(match self.store.mark_delivered(trigger_id, Utc::now())? {
                        MarkOutcome::Applied => PushOutcome::Delivered,
                        MarkOutcome::AlreadyDelivered => PushOutcome::AlreadyDelivered,
                    });
                }
                Err(e) => {
                    warn!(%client_id, %trigger_id, error = %e, "push not confirmed, falling back to offline queue");
                    if let Some(stalled) = slot.live.take() {
                        stalled.handle.close(CLOSE_STALLED, "delivery not confirmed");
                    }
                }
            }
        }

        self.enqueue(&mut slot, client_id, trigger_id)?;
        Ok(PushOutcome::Queued)
    }

    /// Apply an engagement reported by `client_id`.
    pub fn record_engagement(
        &self,
        client_id: &ClientId,
        message: &EngagementMessage,
    ) -> Result<DeliveryState, PalaceError> {
        self.store.record_engagement(
            &message.proactive_id,
            Some(client_id.clone()),
            message.response,
            Utc::now(),
        )
    }

    pub async fn is_connected(&self, client_id: &ClientId) -> bool {
        match self.clients.get(client_id).map(|s| Arc::clone(s.value())) {
            Some(slot) => slot.lock().await.live.is_some(),
            None => false,
        }
    }

    /// Triggers waiting for `client_id`, oldest first.
    pub async fn queued(&self, client_id: &ClientId) -> Vec<TriggerId> {
        match self.clients.get(client_id).map(|s| Arc::clone(s.value())) {
            Some(slot) => slot.lock().await.queue.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot of live sessions.
    pub async fn sessions(&self) -> Vec<ClientSession> {
        let mut out = Vec::new();
        for slot in self.slots() {
            if let Some(live) = &slot.lock().await.live {
                out.push(live.session.clone());
            }
        }
        out.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        out
    }

    fn slot(&self, client_id: &ClientId) -> Arc<Mutex<ClientSlot>> {
        Arc::clone(self.clients.entry(client_id.clone()).or_default().value())
    }

    fn slots(&self) -> Vec<Arc<Mutex<ClientSlot>>> {
        self.clients.iter().map(|e| Arc::clone(e.value())).collect()
    }

    async fn send_trigger(&self, handle: &SessionHandle, trigger: &Trigger) -> Result<(), PalaceError> {
        let frame = ServerFrame::ProactiveTrigger(TriggerPayload::from(trigger)).to_json()?;
        handle.send_confirmed(frame, self.settings.send_timeout).await
    }

    fn enqueue(
        &self,
        slot: &mut ClientSlot,
        client_id: &ClientId,
        trigger_id: &TriggerId,
    ) -> Result<(), PalaceError> {
        self.store.mark_queued(trigger_id)?;
        if !slot.queue.contains(trigger_id) {
            slot.queue.push_back(trigger_id.clone());
        }
        while slot.queue.len() > self.settings.offline_queue_cap {
            let Some(oldest) = slot.queue.pop_front() else {
                break;
            };
            warn!(%client_id, trigger_id = %oldest, cap = self.settings.offline_queue_cap, "offline queue full, evicting oldest trigger");
            if let Err(e) = self.store.evict_queued(&oldest) {
                debug!(trigger_id = %oldest, error = %e, "evicted trigger was no longer queued");
            }
        }
        debug!(%client_id, %trigger_id, depth = slot.queue.len(), "trigger queued");
        Ok(())
    }
}
