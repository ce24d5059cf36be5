//! Message type definitions for client-server communication.
//!
//! Every frame in either direction is a JSON envelope of the form
//! `{ "type": <kind>, "payload": { ... } }`.
//!
//! # Examples
//!
//! Joining a space:
//! ```json
//! { "type": "join", "payload": { "spaceId": "65a1f0", "peerId": "b7c2-peer" } }
//! ```
//!
//! Moving:
//! ```json
//! { "type": "move", "payload": { "x": 150.0, "y": 100.0, "spaceId": "65a1f0" } }
//! ```

use crate::connection::ConnectionId;
use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Payload of a `join` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub space_id: String,
    pub peer_id: String,
}

/// Payload of a `move` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub x: f64,
    pub y: f64,
    /// Informational only; the session's own room is authoritative
    #[serde(default)]
    pub space_id: Option<String>,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinPayload),
    Move(MovePayload),
    /// Any envelope whose `type` is not recognized
    Unsupported { kind: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl ClientMessage {
    /// Decodes a text frame.
    ///
    /// The envelope is read first so that unknown kinds come back as
    /// [`ClientMessage::Unsupported`] instead of an error; a known kind with a
    /// payload of the wrong shape is [`SessionError::Malformed`].
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| SessionError::Malformed(format!("Invalid JSON: {e}")))?;

        match envelope.kind.as_str() {
            "join" => serde_json::from_value(envelope.payload)
                .map(ClientMessage::Join)
                .map_err(|e| SessionError::Malformed(format!("Invalid join payload: {e}"))),
            "move" => serde_json::from_value(envelope.payload)
                .map(ClientMessage::Move)
                .map_err(|e| SessionError::Malformed(format!("Invalid move payload: {e}"))),
            _ => Ok(ClientMessage::Unsupported { kind: envelope.kind }),
        }
    }
}

/// Public fields of a room member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: ConnectionId,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub avatar_image_url: Option<String>,
    pub peer_id: Option<String>,
    pub x: f64,
    pub y: f64,
}

/// Where the joining participant was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spawn {
    pub x: f64,
    pub y: f64,
    pub avatar_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceJoinedPayload {
    pub spawn: Spawn,
    /// Everyone already in the room, excluding the joiner
    pub users: Vec<MemberView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftPayload {
    pub id: ConnectionId,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPayload {
    pub x: f64,
    pub y: f64,
    pub user_id: Option<String>,
}

/// Names the remote side of a media call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSignal {
    pub remote_peer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "space-joined")]
    SpaceJoined(SpaceJoinedPayload),
    #[serde(rename = "user-joined")]
    UserJoined(MemberView),
    #[serde(rename = "user-left")]
    UserLeft(UserLeftPayload),
    #[serde(rename = "movement")]
    Movement(MovementPayload),
    #[serde(rename = "call_init")]
    CallInit(PeerSignal),
    #[serde(rename = "removePeerId")]
    RemovePeerId(PeerSignal),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// The generic error every runtime fault is reported as.
    pub fn internal_error() -> Self {
        Self::error("Internal server error")
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let message =
            ClientMessage::parse(r#"{"type":"join","payload":{"spaceId":"r1","peerId":"p1"}}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::Join(JoinPayload {
                space_id: "r1".to_string(),
                peer_id: "p1".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_move_without_space_id() {
        let message = ClientMessage::parse(r#"{"type":"move","payload":{"x":1.5,"y":-2}}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::Move(MovePayload {
                x: 1.5,
                y: -2.0,
                space_id: None,
            })
        );
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let message = ClientMessage::parse(r#"{"type":"wave","payload":{"at":"everyone"}}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::Unsupported {
                kind: "wave".to_string()
            }
        );
    }

    #[test]
    fn test_bad_payload_is_malformed() {
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"join","payload":{"spaceId":"r1"}}"#),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"move","payload":{"x":"left","y":0}}"#),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(ClientMessage::parse("not json"), Err(SessionError::Malformed(_))));
    }

    #[test]
    fn test_outbound_wire_shapes() {
        let call = serde_json::to_value(ServerMessage::CallInit(PeerSignal {
            remote_peer_id: "p2".to_string(),
        }))
        .unwrap();
        assert_eq!(call, json!({"type": "call_init", "payload": {"remotePeerId": "p2"}}));

        let removal = serde_json::to_value(ServerMessage::RemovePeerId(PeerSignal {
            remote_peer_id: "p2".to_string(),
        }))
        .unwrap();
        assert_eq!(removal["type"], "removePeerId");

        let movement = serde_json::to_value(ServerMessage::Movement(MovementPayload {
            x: 1.0,
            y: 2.0,
            user_id: Some("u-1".to_string()),
        }))
        .unwrap();
        assert_eq!(
            movement,
            json!({"type": "movement", "payload": {"x": 1.0, "y": 2.0, "userId": "u-1"}})
        );

        let error = serde_json::to_value(ServerMessage::internal_error()).unwrap();
        assert_eq!(
            error,
            json!({"type": "error", "payload": {"message": "Internal server error"}})
        );
    }

    #[test]
    fn test_space_joined_shape() {
        let id = ConnectionId::new();
        let message = ServerMessage::SpaceJoined(SpaceJoinedPayload {
            spawn: Spawn {
                x: 549.2,
                y: 749.8,
                avatar_image_url: Some("https://img.example/a.png".to_string()),
            },
            users: vec![MemberView {
                id,
                user_id: Some("u-2".to_string()),
                username: Some("grace".to_string()),
                avatar_image_url: None,
                peer_id: Some("p2".to_string()),
                x: 10.0,
                y: 20.0,
            }],
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "space-joined");
        assert_eq!(value["payload"]["spawn"]["avatarImageUrl"], "https://img.example/a.png");
        assert_eq!(value["payload"]["users"][0]["id"], id.to_string());
        assert_eq!(value["payload"]["users"][0]["peerId"], "p2");

        let back: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, message);
    }
}
