// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket frames exchanged with clients.
//!
//! Client -> Server (JSON), the first frame after connecting:
//! ```json
//! {"authToken": "secret", "clientType": "patient", "clientId": "optional"}
//! ```
//! then any number of engagement reports:
//! ```json
//! {"proactiveId": "trigger-id", "response": "viewed"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "authenticated", "clientId": "patient"}
//! {"type": "proactive_trigger", "id": "...", "trigger_type": "on_this_day", ...}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PalaceError;
use crate::types::{ClientId, ClientType, EngagementResponse, TriggerId, TriggerPayload};

/// Normal closure, sent by a client that is done.
pub const CLOSE_NORMAL: u16 = 1000;

/// WebSocket close code sent when the handshake is rejected.
pub const CLOSE_AUTH_FAILED: u16 = 4401;
/// Close code for a session replaced by a newer connection of the same client.
pub const CLOSE_SUPERSEDED: u16 = 4409;
/// Close code for a session reaped after missing pongs.
pub const CLOSE_IDLE: u16 = 4408;
/// Close code for a session that did not confirm a trigger in time. The
/// client reconnects and receives it from its offline queue.
pub const CLOSE_STALLED: u16 = 4410;
/// Close code for the server shutting down.
pub const CLOSE_SHUTDOWN: u16 = 1001;

/// The authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthHandshake {
    pub auth_token: String,
    pub client_type: ClientType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

impl AuthHandshake {
    /// The explicit client id, else the client type's name, so a reconnecting
    /// device reclaims its own offline queue.
    pub fn resolved_client_id(&self) -> ClientId {
        match &self.client_id {
            Some(id) if !id.as_str().trim().is_empty() => id.clone(),
            _ => ClientId::from(self.client_type.to_string()),
        }
    }
}

impl std::fmt::Display for AuthHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handshake from {}", self.resolved_client_id())
    }
}

/// A client's reaction to a delivered trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMessage {
    pub proactive_id: TriggerId,
    pub response: EngagementResponse,
}

/// Everything the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Authenticated {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
    ProactiveTrigger(TriggerPayload),
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, PalaceError> {
        serde_json::to_string(self)
            .map_err(|e| PalaceError::malformed("unserializable server frame", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::{DirectorResponse, TriggerType};

    #[test]
    fn handshake_is_camel_case() {
        let hs: AuthHandshake =
            serde_json::from_str(r#"{"authToken":"s3cret","clientType":"patient"}"#).unwrap();
        assert_eq!(hs.auth_token, "s3cret");
        assert_eq!(hs.client_type, ClientType::Patient);
        assert_eq!(hs.resolved_client_id().as_str(), "patient");
    }

    #[test]
    fn explicit_client_id_wins() {
        let hs: AuthHandshake = serde_json::from_str(
            r#"{"authToken":"s","clientType":"caregiver","clientId":"tablet-2"}"#,
        )
        .unwrap();
        assert_eq!(hs.resolved_client_id().as_str(), "tablet-2");
    }

    #[test]
    fn handshake_display_omits_token() {
        let hs = AuthHandshake {
            auth_token: "s3cret".into(),
            client_type: ClientType::Patient,
            client_id: None,
        };
        assert!(!hs.to_string().contains("s3cret"));
    }

    #[test]
    fn engagement_parses_saved() {
        let msg: EngagementMessage =
            serde_json::from_str(r#"{"proactiveId":"t1","response":"saved"}"#).unwrap();
        assert_eq!(msg.proactive_id.as_str(), "t1");
        assert_eq!(msg.response, EngagementResponse::Saved);
    }

    #[test]
    fn engagement_rejects_unknown_response() {
        assert!(
            serde_json::from_str::<EngagementMessage>(r#"{"proactiveId":"t1","response":"liked"}"#)
                .is_err()
        );
    }

    #[test]
    fn trigger_frame_is_flat() {
        let payload = TriggerPayload {
            id: "t1".into(),
            trigger_type: TriggerType::Anniversary,
            title: "Wedding anniversary coming up".into(),
            description: "Wedding day is in 3 days".into(),
            memory_count: 0,
            created_at: Utc::now(),
            memories: vec![],
            director_response: Some(DirectorResponse::narrative("Hello")),
        };
        let json: serde_json::Value =
            serde_json::from_str(&ServerFrame::ProactiveTrigger(payload).to_json().unwrap())
                .unwrap();
        assert_eq!(json["type"], "proactive_trigger");
        assert_eq!(json["id"], "t1");
        assert_eq!(json["trigger_type"], "anniversary");
        assert_eq!(json["director_response"]["response_type"], "narrative");
    }

    #[test]
    fn authenticated_frame() {
        let json = ServerFrame::Authenticated {
            client_id: "patient".into(),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"authenticated","clientId":"patient"}"#);
    }
}
