// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The whole proactive path over a real gateway: ingest over HTTP, evaluate,
//! receive the trigger on a patient client, play it and report engagement.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use palace_agent::Pipeline;
use palace_client::{ClientConfig, ClientStreams, ConnectionEvent, DeliveryClient};
use palace_core::{
    DeliveryState, DirectorResponse, EngagementResponse, PatientContext, TriggerPayload,
};
use palace_gateway::ProactiveBackend;
use palace_playback::{PlaybackController, PlaybackEvent, PlaybackState};
use palace_test_utils::{
    FixedClock, MockNarrator, MockScorer, MockSynthesizer, TestHarness, fixtures,
};

fn scorer() -> MockScorer {
    MockScorer::new()
        .with_json(
            "wedding",
            json!({
                "anniversary_type": "wedding",
                "seasonal_tags": [],
                "proactive_score": 5,
                "reasoning": "their wedding day"
            }),
        )
        .with_json(
            "honeymoon",
            json!({
                "anniversary_type": "none",
                "seasonal_tags": ["summer"],
                "proactive_score": 4.5,
                "reasoning": "honeymoon trip"
            }),
        )
}

async fn start() -> (TestHarness, Arc<Pipeline>) {
    let mut pipeline = None;
    let harness = TestHarness::builder()
        .build(|channel| {
            let built = Arc::new(
                Pipeline::builder(Arc::new(scorer()))
                    .with_narrator(Arc::new(MockNarrator::new()))
                    .with_synthesizer(Arc::new(MockSynthesizer::new().with_duration_ms(3_000)))
                    .with_clock(Arc::new(FixedClock::at_date(2025, 6, 12)))
                    .with_patient(PatientContext {
                        name: "Margaret".into(),
                        ..PatientContext::default()
                    })
                    .build(channel),
            );
            pipeline = Some(Arc::clone(&built));
            built as Arc<dyn ProactiveBackend>
        })
        .await
        .unwrap();
    (harness, pipeline.unwrap())
}

async fn post(harness: &TestHarness, path: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(harness.http_url(path))
        .bearer_auth(harness.token())
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn ingest_wedding_memories(harness: &TestHarness) {
    for memory in [
        fixtures::photo("wedding", "Our wedding", fixtures::date(1965, 6, 12)),
        fixtures::video("honeymoon", "Honeymoon in Maine", fixtures::date(1965, 6, 12)),
    ] {
        let response = post(harness, "/v1/memories", serde_json::to_value(&memory).unwrap()).await;
        assert_eq!(response.status(), 201);
    }
}

async fn connect(harness: &TestHarness) -> (palace_client::ClientHandle, ClientStreams) {
    let (client, mut streams) =
        DeliveryClient::new(ClientConfig::new(harness.ws_url(), harness.token())).spawn();
    let event = tokio::time::timeout(Duration::from_secs(5), streams.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ConnectionEvent::Connected { .. }));
    (client, streams)
}

async fn next_trigger(streams: &mut ClientStreams) -> TriggerPayload {
    tokio::time::timeout(Duration::from_secs(5), streams.triggers.recv())
        .await
        .expect("timed out waiting for a trigger")
        .expect("trigger stream closed")
}

#[tokio::test]
async fn live_patient_receives_a_narrated_show() {
    let (harness, pipeline) = start().await;
    ingest_wedding_memories(&harness).await;
    assert_eq!(pipeline.corpus().len(), 2);

    let (client, mut streams) = connect(&harness).await;

    let summary: Value = post(&harness, "/v1/evaluate", json!({})).await.json().await.unwrap();
    assert_eq!(summary["delivered"], 1);
    assert_eq!(summary["queued"], 0);

    let payload = next_trigger(&mut streams).await;
    assert_eq!(payload.memory_count, 2);
    let Some(DirectorResponse::CinematicShow(show)) = payload.director_response.clone() else {
        panic!("expected a cinematic show, got {:?}", payload.director_response);
    };
    assert_eq!(show.len(), 2);
    assert!(show.scenes().iter().all(|s| s.narration_duration_ms.is_some()));
    assert_eq!(
        harness.store().get(&payload.id).unwrap().delivery_state,
        DeliveryState::Delivered
    );

    // The device plays what it received.
    let mut playback = PlaybackController::default();
    let started = playback.accept(payload.id.to_string(), payload.director_response.as_ref().unwrap());
    assert!(matches!(started[0], PlaybackEvent::ShowStarted { scene_count: 2, .. }));
    let events = playback.advance(Duration::from_secs(600));
    assert!(matches!(events.last(), Some(PlaybackEvent::Complete { .. })));
    assert_eq!(playback.state(), PlaybackState::Complete);

    client
        .send_engagement(payload.id.clone(), EngagementResponse::Saved)
        .await
        .unwrap();
    let store = Arc::clone(harness.store());
    for _ in 0..100 {
        if !store.engagements(&payload.id).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.get(&payload.id).unwrap().delivery_state, DeliveryState::Viewed);
    assert_eq!(store.engagements(&payload.id)[0].response, EngagementResponse::Saved);

    client.close().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn offline_patient_gets_the_show_on_connect() {
    let (harness, pipeline) = start().await;
    ingest_wedding_memories(&harness).await;

    let summary = pipeline.run_evaluation().await.unwrap();
    assert_eq!(summary.queued, 1);
    let queued_id = summary.created[0].id.clone();
    assert_eq!(
        harness.store().get(&queued_id).unwrap().delivery_state,
        DeliveryState::Queued
    );

    let (client, mut streams) = connect(&harness).await;
    let payload = next_trigger(&mut streams).await;
    assert_eq!(payload.id, queued_id);
    assert!(payload
        .director_response
        .as_ref()
        .is_some_and(DirectorResponse::is_cinematic));

    client.close().await;
    harness.shutdown().await;
}

#[tokio::test]
async fn chat_replies_through_the_director() {
    let (harness, _pipeline) = start().await;
    ingest_wedding_memories(&harness).await;

    let casual: Value = post(
        &harness,
        "/v1/respond",
        json!({"message": "good morning", "conversation_type": "casual"}),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(casual["response_type"], "narrative");
    assert_eq!(casual["message"], "You said: good morning");

    let unknown = post(
        &harness,
        "/v1/respond",
        json!({"message": "show me", "memory_ids": ["nope"]}),
    )
    .await;
    assert_eq!(unknown.status(), 404);

    harness.shutdown().await;
}

#[tokio::test]
async fn health_reports_pipeline_collaborators() {
    let (harness, _pipeline) = start().await;
    let health: Value = reqwest::get(harness.http_url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    for name in ["mock-scorer", "mock-narrator", "mock-synthesizer"] {
        assert_eq!(health["collaborators"][name]["ready"], true, "{name}");
    }
    harness.shutdown().await;
}
