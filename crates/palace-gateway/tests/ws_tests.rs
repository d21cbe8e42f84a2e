// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests against a gateway bound to an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use palace_core::{
    ClientId, DeliveryState, DirectorResponse, EngagementResponse, HealthStatus, Memory, MemoryId, PalaceError,
    SignificanceResult, Trigger, TriggerId, TriggerStore, TriggerType,
};
use palace_gateway::protocol::CLOSE_AUTH_FAILED;
use palace_gateway::{
    AuthConfig, ChannelManager, ChannelSettings, EvaluationSummary, GatewayState,
    ProactiveBackend, RespondBody, RunningGateway, ServerConfig, start_server,
};

const TOKEN: &str = "s3cret";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct StubBackend;

#[async_trait]
impl ProactiveBackend for StubBackend {
    async fn analyze(&self, memory: Memory) -> Result<SignificanceResult, PalaceError> {
        Err(PalaceError::unavailable("stub", format!("cannot analyze {}", memory.id)))
    }

    async fn ingest(&self, memory: Memory) -> Result<SignificanceResult, PalaceError> {
        self.analyze(memory).await
    }

    async fn respond(&self, body: RespondBody) -> Result<DirectorResponse, PalaceError> {
        Ok(DirectorResponse::narrative(format!("echo: {}", body.message)))
    }

    async fn evaluate(&self) -> Result<EvaluationSummary, PalaceError> {
        Ok(EvaluationSummary::default())
    }

    async fn collaborator_health(&self) -> Vec<(String, HealthStatus)> {
        vec![("stub".into(), HealthStatus::Healthy)]
    }
}

struct Gateway {
    running: RunningGateway,
    store: Arc<TriggerStore>,
    _audio: tempfile::TempDir,
}

impl Gateway {
    async fn start() -> Self {
        let audio = tempfile::tempdir().unwrap();
        std::fs::write(audio.path().join("clip.wav"), b"RIFF").unwrap();
        let store = Arc::new(TriggerStore::new());
        let auth = AuthConfig::new(Some(TOKEN.into()));
        let channel = Arc::new(ChannelManager::new(
            Arc::clone(&store),
            auth.clone(),
            ChannelSettings::default(),
        ));
        let state = GatewayState::new(channel, Arc::new(StubBackend), auth);
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            audio_dir: audio.path().to_path_buf(),
        };
        let running = start_server(&config, state).await.unwrap();
        Self {
            running,
            store,
            _audio: audio,
        }
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{path}", self.running.local_addr())
    }

    async fn connect(&self, handshake: serde_json::Value) -> Client {
        let url = format!("ws://{}/ws", self.running.local_addr());
        let (mut ws, _) = connect_async(url).await.unwrap();
        ws.send(Message::Text(handshake.to_string().into()))
            .await
            .unwrap();
        ws
    }

    fn trigger(&self, id: &str) -> Trigger {
        self.store.insert(Trigger {
            id: TriggerId::from(id),
            trigger_type: TriggerType::OnThisDay,
            memory_ids: vec![MemoryId::from(format!("m-{id}"))],
            memories: vec![],
            title: format!("Trigger {id}"),
            description: String::new(),
            created_at: Utc::now(),
            sequence: 0,
            delivery_state: DeliveryState::Pending,
            director_response: Some(DirectorResponse::narrative("Remember this?")),
        })
    }
}

fn patient_handshake() -> serde_json::Value {
    serde_json::json!({"authToken": TOKEN, "clientType": "patient"})
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut Client) -> serde_json::Value {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout(deadline, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for<F: Fn() -> bool>(check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 2s");
}

#[tokio::test]
async fn handshake_is_acknowledged() {
    let gateway = Gateway::start().await;
    let mut ws = gateway.connect(patient_handshake()).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "authenticated");
    assert_eq!(frame["clientId"], "patient");

    gateway.running.stop().await;
}

#[tokio::test]
async fn bad_token_closes_with_auth_code() {
    let gateway = Gateway::start().await;
    let mut ws = gateway
        .connect(serde_json::json!({"authToken": "wrong", "clientType": "patient"}))
        .await;

    let mut close_code = None;
    while let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(5), ws.next()).await {
        match msg {
            Message::Text(_) => panic!("no frame may reach an unauthenticated client"),
            Message::Close(frame) => {
                close_code = frame.map(|f| u16::from(f.code));
                break;
            }
            _ => {}
        }
    }
    assert_eq!(close_code, Some(CLOSE_AUTH_FAILED));
    assert!(gateway.running.channel().sessions().await.is_empty());

    gateway.running.stop().await;
}

#[tokio::test]
async fn queued_triggers_follow_the_acknowledgement() {
    let gateway = Gateway::start().await;
    let t1 = gateway.trigger("t1");
    let t2 = gateway.trigger("t2");
    let channel = Arc::clone(gateway.running.channel());
    channel.push(&ClientId::from("patient"), &t1.id).await.unwrap();
    channel.push(&ClientId::from("patient"), &t2.id).await.unwrap();

    let mut ws = gateway.connect(patient_handshake()).await;
    assert_eq!(next_json(&mut ws).await["type"], "authenticated");

    let first = next_json(&mut ws).await;
    assert_eq!(first["type"], "proactive_trigger");
    assert_eq!(first["id"], "t1");
    assert_eq!(first["director_response"]["message"], "Remember this?");
    assert_eq!(next_json(&mut ws).await["id"], "t2");

    let store = Arc::clone(&gateway.store);
    wait_for(|| {
        store.get(&t2.id).unwrap().delivery_state == DeliveryState::Delivered
    })
    .await;

    gateway.running.stop().await;
}

#[tokio::test]
async fn live_push_reaches_connected_client() {
    let gateway = Gateway::start().await;
    let mut ws = gateway.connect(patient_handshake()).await;
    assert_eq!(next_json(&mut ws).await["type"], "authenticated");

    let channel = Arc::clone(gateway.running.channel());
    let patient = ClientId::from("patient");
    let connected = {
        let mut ok = false;
        for _ in 0..100 {
            if channel.is_connected(&patient).await {
                ok = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        ok
    };
    assert!(connected);

    let t1 = gateway.trigger("t1");
    channel.push(&patient, &t1.id).await.unwrap();
    assert_eq!(next_json(&mut ws).await["id"], "t1");

    gateway.running.stop().await;
}

#[tokio::test]
async fn engagement_frames_update_the_store_and_garbage_is_ignored() {
    let gateway = Gateway::start().await;
    let t1 = gateway.trigger("t1");
    gateway.store.mark_delivered(&t1.id, Utc::now()).unwrap();

    let mut ws = gateway.connect(patient_handshake()).await;
    assert_eq!(next_json(&mut ws).await["type"], "authenticated");

    ws.send(Message::Text("{not json".into())).await.unwrap();
    ws.send(Message::Text(
        serde_json::json!({"proactiveId": "t1", "response": "saved"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let store = Arc::clone(&gateway.store);
    wait_for(|| !store.engagements(&t1.id).is_empty()).await;
    assert_eq!(store.get(&t1.id).unwrap().delivery_state, DeliveryState::Viewed);
    assert_eq!(store.engagements(&t1.id)[0].response, EngagementResponse::Saved);

    gateway.running.stop().await;
}

#[tokio::test]
async fn health_is_public_and_api_requires_bearer() {
    let gateway = Gateway::start().await;
    let http = reqwest::Client::new();

    let health: serde_json::Value = http
        .get(gateway.http("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["collaborators"]["stub"]["ready"], true);

    let anonymous = http.get(gateway.http("/v1/triggers")).send().await.unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let reply = http
        .post(gateway.http("/v1/respond"))
        .bearer_auth(TOKEN)
        .json(&serde_json::json!({"message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(reply.status().as_u16(), 200);
    let body: serde_json::Value = reply.json().await.unwrap();
    assert_eq!(body["response_type"], "narrative");
    assert_eq!(body["message"], "echo: hi");

    gateway.running.stop().await;
}

#[tokio::test]
async fn audio_files_are_served() {
    let gateway = Gateway::start().await;
    let resp = reqwest::get(gateway.http("/audio/clip.wav")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"RIFF");

    gateway.running.stop().await;
}
