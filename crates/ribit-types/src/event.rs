//! Inbound event type.
//!
//! [`InboundEvent`] is produced by the transport layer (the Matrix sync
//! loop) and is read-only to the core pipeline. One event corresponds to
//! one `m.room.message` timeline entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A text message received from a room.
///
/// `sender` and `room_id` are opaque protocol identifiers compared by
/// exact value (`@user:homeserver`, `!room:homeserver`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Room the message arrived in.
    pub room_id: String,

    /// Full identity of the sender.
    pub sender: String,

    /// Raw message text as typed by the user.
    pub body: String,

    /// Protocol event identifier (used for logging and de-duplication).
    pub event_id: String,

    /// When the message was received.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Whether the event carries an explicit mention of the agent
    /// (`m.mentions` on Matrix). A mentioned event is treated as
    /// addressed even without a trigger-token prefix.
    #[serde(default)]
    pub mentioned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip() {
        let event = InboundEvent {
            room_id: "!room:example.org".into(),
            sender: "@alice:example.org".into(),
            body: "ribit.2.0 hello".into(),
            event_id: "$abc123".into(),
            timestamp: Utc::now(),
            mentioned: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: InboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.room_id, "!room:example.org");
        assert_eq!(restored.sender, "@alice:example.org");
        assert_eq!(restored.body, "ribit.2.0 hello");
    }

    #[test]
    fn defaults_on_missing_fields() {
        let json = r#"{
            "room_id": "!r:x",
            "sender": "@u:x",
            "body": "hi",
            "event_id": "$1"
        }"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        assert!(!event.mentioned);
    }
}
