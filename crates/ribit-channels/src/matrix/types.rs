//! Wire types for the Matrix client-server API (v3 subset).
//!
//! Only the fields the agent actually reads are modeled; everything
//! else is ignored during deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Response to `GET /_matrix/client/v3/account/whoami`.
#[derive(Debug, Deserialize)]
pub struct WhoAmIResponse {
    /// Full user ID the access token belongs to.
    pub user_id: String,
}

/// Response to `GET /_matrix/client/v3/sync`.
#[derive(Debug, Deserialize)]
pub struct SyncResponse {
    /// Token to pass as `since` on the next sync.
    pub next_batch: String,

    /// Room updates included in this sync.
    #[serde(default)]
    pub rooms: SyncRooms,
}

/// The `rooms` section of a sync response.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRooms {
    /// Rooms the user has joined, keyed by room ID.
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,

    /// Rooms the user has been invited to, keyed by room ID.
    #[serde(default)]
    pub invite: HashMap<String, InvitedRoom>,
}

/// Joined-room data within a sync response.
#[derive(Debug, Default, Deserialize)]
pub struct JoinedRoom {
    /// New timeline events since the last sync.
    #[serde(default)]
    pub timeline: Timeline,
}

/// Invited-room data. The invite state is not inspected; the room ID
/// (the map key) is all the auto-join policy needs.
#[derive(Debug, Default, Deserialize)]
pub struct InvitedRoom {
    /// Stripped state events describing the invite (unused).
    #[serde(default)]
    pub invite_state: serde_json::Value,
}

/// Timeline section of a joined room.
#[derive(Debug, Default, Deserialize)]
pub struct Timeline {
    /// Events, oldest first.
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

/// A single room event.
#[derive(Debug, Deserialize)]
pub struct RoomEvent {
    /// Event type (e.g. `m.room.message`).
    #[serde(rename = "type")]
    pub event_type: String,

    /// Sender's full user ID.
    #[serde(default)]
    pub sender: String,

    /// Event identifier.
    #[serde(default)]
    pub event_id: String,

    /// Server timestamp in milliseconds since the epoch.
    #[serde(default)]
    pub origin_server_ts: i64,

    /// Event content, type-dependent.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RoomEvent {
    /// Text body, when this is an `m.text` message event.
    pub fn text_body(&self) -> Option<&str> {
        if self.event_type != "m.room.message" {
            return None;
        }
        if self.content.get("msgtype").and_then(|v| v.as_str()) != Some("m.text") {
            return None;
        }
        self.content.get("body").and_then(|v| v.as_str())
    }

    /// Whether the event's `m.mentions` block names `user_id`.
    pub fn mentions(&self, user_id: &str) -> bool {
        self.content
            .get("m.mentions")
            .and_then(|m| m.get("user_ids"))
            .and_then(|ids| ids.as_array())
            .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(user_id)))
    }
}

/// Body of `PUT /_matrix/client/v3/rooms/{roomId}/send/m.room.message/{txnId}`.
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    /// Always `m.text` for this agent.
    pub msgtype: &'a str,
    /// Message text.
    pub body: &'a str,
}

/// Response to a send request.
#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    /// ID of the event that was created.
    pub event_id: String,
}

/// Response to `POST /_matrix/client/v3/join/{roomIdOrAlias}`.
#[derive(Debug, Deserialize)]
pub struct JoinResponse {
    /// ID of the room that was joined.
    pub room_id: String,
}

/// Standard Matrix error body.
#[derive(Debug, Deserialize)]
pub struct MatrixErrorBody {
    /// Machine-readable error code (e.g. `M_UNKNOWN_TOKEN`).
    #[serde(default)]
    pub errcode: String,

    /// Human-readable error message.
    #[serde(default)]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event(json: serde_json::Value) -> RoomEvent {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn sync_response_parses_minimal() {
        let resp: SyncResponse = serde_json::from_str(r#"{"next_batch":"s1"}"#).unwrap();
        assert_eq!(resp.next_batch, "s1");
        assert!(resp.rooms.join.is_empty());
        assert!(resp.rooms.invite.is_empty());
    }

    #[test]
    fn sync_response_parses_rooms() {
        let json = r#"{
            "next_batch": "s2",
            "rooms": {
                "join": {
                    "!lab:envs.net": {
                        "timeline": {
                            "events": [{
                                "type": "m.room.message",
                                "sender": "@alice:envs.net",
                                "event_id": "$e1",
                                "origin_server_ts": 1700000000000,
                                "content": {"msgtype": "m.text", "body": "hi"}
                            }]
                        }
                    }
                },
                "invite": {
                    "!new:envs.net": {"invite_state": {"events": []}}
                }
            }
        }"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        let room = &resp.rooms.join["!lab:envs.net"];
        assert_eq!(room.timeline.events.len(), 1);
        assert_eq!(room.timeline.events[0].text_body(), Some("hi"));
        assert!(resp.rooms.invite.contains_key("!new:envs.net"));
    }

    #[test]
    fn text_body_requires_text_msgtype() {
        let event = message_event(serde_json::json!({
            "type": "m.room.message",
            "content": {"msgtype": "m.image", "body": "cat.png"}
        }));
        assert_eq!(event.text_body(), None);
    }

    #[test]
    fn text_body_requires_message_type() {
        let event = message_event(serde_json::json!({
            "type": "m.room.member",
            "content": {"msgtype": "m.text", "body": "hi"}
        }));
        assert_eq!(event.text_body(), None);
    }

    #[test]
    fn mentions_detects_user_id() {
        let event = message_event(serde_json::json!({
            "type": "m.room.message",
            "content": {
                "msgtype": "m.text",
                "body": "what do you think?",
                "m.mentions": {"user_ids": ["@ribit.2.0:envs.net"]}
            }
        }));
        assert!(event.mentions("@ribit.2.0:envs.net"));
        assert!(!event.mentions("@other:envs.net"));
    }

    #[test]
    fn mentions_absent_is_false() {
        let event = message_event(serde_json::json!({
            "type": "m.room.message",
            "content": {"msgtype": "m.text", "body": "hi"}
        }));
        assert!(!event.mentions("@ribit.2.0:envs.net"));
    }
}
