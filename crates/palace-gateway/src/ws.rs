// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket connection handling.
//!
//! Each connection runs a writer task fed through an mpsc channel and a
//! reader loop. The first text frame must be an [`AuthHandshake`]; until it
//! verifies, nothing is sent and nothing is accepted.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use palace_core::ClientId;

use crate::channel::{ChannelManager, Outbound, SessionHandle};
use crate::protocol::{
    AuthHandshake, CLOSE_AUTH_FAILED, CLOSE_IDLE, EngagementMessage, ServerFrame,
};
use crate::server::GatewayState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.channel))
}

pub async fn handle_socket(socket: WebSocket, channel: Arc<ChannelManager>) {
    let (sink, mut stream) = socket.split();
    let connection_id = channel.next_connection_id();
    let settings = channel.settings().clone();
    let (tx, rx) = mpsc::channel::<Outbound>(64);
    let writer = tokio::spawn(write_loop(sink, rx));

    let handshake =
        match tokio::time::timeout(settings.idle_timeout, read_handshake(&mut stream)).await {
            Ok(Some(handshake)) => handshake,
            Ok(None) => {
                debug!(connection_id, "connection closed before handshake");
                finish(tx, writer, settings.send_timeout).await;
                return;
            }
            Err(_) => {
                warn!(connection_id, "no handshake before timeout, closing");
                reject(&tx, "handshake timeout").await;
                finish(tx, writer, settings.send_timeout).await;
                return;
            }
        };

    let session = match channel.authenticate(&handshake) {
        Ok(session) => session,
        Err(e) => {
            warn!(connection_id, client_id = %handshake.resolved_client_id(), error = %e, "handshake rejected");
            reject(&tx, "authentication failed").await;
            finish(tx, writer, settings.send_timeout).await;
            return;
        }
    };

    let client_id = session.client_id.clone();
    let handle = SessionHandle::new(connection_id, client_id.clone(), tx.clone());

    // `authenticated` goes out before any flushed trigger.
    let ack = ServerFrame::Authenticated {
        client_id: client_id.clone(),
    };
    let acked = match ack.to_json() {
        Ok(text) => handle.send_confirmed(text, settings.send_timeout).await,
        Err(e) => Err(e),
    };
    if let Err(e) = acked {
        warn!(%client_id, error = %e, "could not acknowledge handshake");
        drop(handle);
        finish(tx, writer, settings.send_timeout).await;
        return;
    }

    let closed = handle.closed();
    if let Err(e) = channel.attach(session, handle).await {
        warn!(%client_id, connection_id, error = %e, "failed to attach session, closing");
        finish(tx, writer, settings.send_timeout).await;
        return;
    }

    let link = Link {
        channel: &channel,
        client_id: &client_id,
        connection_id,
        tx: &tx,
        closed,
    };
    read_loop(link, &mut stream, settings.ping_interval, settings.idle_timeout).await;

    channel.detach(&client_id, connection_id).await;
    finish(tx, writer, settings.send_timeout).await;
    info!(%client_id, connection_id, "connection closed");
}

async fn read_handshake(stream: &mut SplitStream<WebSocket>) -> Option<AuthHandshake> {
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let text: &str = &text;
                match serde_json::from_str::<AuthHandshake>(text) {
                    Ok(handshake) => return Some(handshake),
                    Err(e) => warn!(error = %e, "malformed handshake frame dropped"),
                }
            }
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

/// One authenticated connection as seen by its reader.
struct Link<'a> {
    channel: &'a ChannelManager,
    client_id: &'a ClientId,
    connection_id: u64,
    tx: &'a mpsc::Sender<Outbound>,
    closed: CancellationToken,
}

async fn read_loop(
    link: Link<'_>,
    stream: &mut SplitStream<WebSocket>,
    ping_interval: Duration,
    idle_timeout: Duration,
) {
    let Link {
        channel,
        client_id,
        connection_id,
        tx,
        closed,
    } = link;
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    channel.touch(client_id, connection_id).await;
                    let text: &str = &text;
                    handle_text(channel, client_id, text);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    last_seen = Instant::now();
                    channel.touch(client_id, connection_id).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    last_seen = Instant::now();
                    warn!(%client_id, "binary frame dropped");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(%client_id, error = %e, "websocket read error");
                    break;
                }
            },
            _ = closed.cancelled() => {
                debug!(%client_id, connection_id, "connection closed by channel");
                break;
            }
            _ = ping.tick() => {
                if last_seen.elapsed() > idle_timeout {
                    warn!(%client_id, "client went silent, closing session");
                    let _ = tx
                        .send(Outbound::Close { code: CLOSE_IDLE, reason: "idle timeout".into() })
                        .await;
                    break;
                }
                if tx.send(Outbound::Ping).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn handle_text(channel: &ChannelManager, client_id: &ClientId, text: &str) {
    let message: EngagementMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(%client_id, error = %e, "malformed frame dropped");
            return;
        }
    };
    match channel.record_engagement(client_id, &message) {
        Ok(state) => info!(
            %client_id,
            trigger_id = %message.proactive_id,
            response = %message.response,
            %state,
            "engagement recorded"
        ),
        Err(e) => warn!(%client_id, trigger_id = %message.proactive_id, error = %e, "engagement rejected"),
    }
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::Receiver<Outbound>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(cmd) = rx.recv().await {
        if cmd.is_abandoned() {
            debug!("dropping frame nobody is waiting on");
            continue;
        }
        match cmd {
            Outbound::Frame { text, written } => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
                if let Some(written) = written {
                    let _ = written.send(());
                }
            }
            Outbound::Ping => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
}

async fn reject(tx: &mpsc::Sender<Outbound>, reason: &str) {
    let _ = tx
        .send(Outbound::Close {
            code: CLOSE_AUTH_FAILED,
            reason: reason.to_string(),
        })
        .await;
}

/// Let the writer drain, then make sure it is gone.
async fn finish(
    tx: mpsc::Sender<Outbound>,
    writer: tokio::task::JoinHandle<()>,
    grace: Duration,
) {
    drop(tx);
    let abort = writer.abort_handle();
    if tokio::time::timeout(grace, writer).await.is_err() {
        abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn text_of(msg: &Message) -> Option<String> {
        match msg {
            Message::Text(text) => Some(text.to_string()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn writer_skips_frames_whose_sender_gave_up() {
        let (sink, mut written) = futures::channel::mpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);

        let (gave_up, dropped) = oneshot::channel();
        drop(dropped);
        let (waiting, ack) = oneshot::channel();
        tx.send(Outbound::Frame {
            text: "stale".into(),
            written: Some(gave_up),
        })
        .await
        .unwrap();
        tx.send(Outbound::Frame {
            text: "fresh".into(),
            written: Some(waiting),
        })
        .await
        .unwrap();
        drop(tx);

        write_loop(sink, rx).await;

        let mut texts = Vec::new();
        while let Some(msg) = written.next().await {
            texts.extend(text_of(&msg));
        }
        assert_eq!(texts, vec!["fresh".to_string()]);
        assert!(ack.await.is_ok(), "fresh frame confirmed");
    }

    #[tokio::test]
    async fn writer_stops_after_close() {
        let (sink, mut written) = futures::channel::mpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        tx.send(Outbound::Close {
            code: crate::protocol::CLOSE_STALLED,
            reason: "delivery not confirmed".into(),
        })
        .await
        .unwrap();
        tx.send(Outbound::Frame {
            text: "late".into(),
            written: None,
        })
        .await
        .unwrap();

        write_loop(sink, rx).await;

        let mut seen = Vec::new();
        while let Some(msg) = written.next().await {
            seen.push(msg);
        }
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Message::Close(Some(frame)) => assert_eq!(frame.code, crate::protocol::CLOSE_STALLED),
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
