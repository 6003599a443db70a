//! Wire protocol: JSON events exchanged over the WebSocket transport.
//!
//! Frames are JSON objects tagged by an `event` field, e.g.
//!
//! ```json
//! {"event": "join_room", "room_type": "dm", "target": "bob"}
//! {"event": "message", "id": 7, "room": "group:lobby", "sender": "alice", ...}
//! ```

use serde::{Deserialize, Serialize};

fn default_room_type() -> String {
    crate::rooms::KIND_GROUP.to_string()
}

/// Room addressing fields shared by the room-scoped client events.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomTarget {
    /// `"group"` or `"dm"`; anything else is rejected at resolution.
    #[serde(default = "default_room_type")]
    pub room_type: String,
    /// Group room name; defaults to the lobby when absent.
    #[serde(default)]
    pub room_name: Option<String>,
    /// Direct-room counterparty.
    #[serde(default)]
    pub target: Option<String>,
}

/// Events a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Register {
        #[serde(default)]
        username: String,
    },
    JoinRoom {
        #[serde(flatten)]
        room: RoomTarget,
    },
    LeaveRoom {
        #[serde(flatten)]
        room: RoomTarget,
    },
    SendMessage {
        #[serde(flatten)]
        room: RoomTarget,
        #[serde(default)]
        content: String,
    },
    MarkRead {
        #[serde(flatten)]
        room: RoomTarget,
    },
}

impl ClientEvent {
    /// Static event name, used for metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage { .. } => "send_message",
            Self::MarkRead { .. } => "mark_read",
        }
    }
}

/// A chat message as broadcast to a room.
#[derive(Debug, Clone, Serialize)]
pub struct MessageBroadcast {
    pub id: i64,
    pub room: String,
    pub sender: String,
    pub recipient: Option<String>,
    pub content: String,
    pub created_at: String,
    pub is_read: bool,
    /// Mentioned usernames, one entry per occurrence in the content.
    pub mentions: Vec<String>,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        message: String,
    },
    Registered {
        username: String,
    },
    RoomJoined {
        room: String,
    },
    RoomLeft {
        room: String,
    },
    /// Presence update: the distinct, sorted usernames live in a room.
    RoomUsersUpdate {
        users: Vec<String>,
    },
    Message(MessageBroadcast),
    MentionNotification {
        message_id: i64,
        sender: String,
        content: String,
        room: String,
        created_at: String,
    },
    NotificationUpdate {
        #[serde(rename = "type")]
        update_type: &'static str,
        /// Live unread-notification count for the addressed user.
        count: i64,
    },
    ReadReceipt {
        room: String,
        count: u64,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_with_defaults() {
        let ev: ClientEvent = serde_json::from_str(r#"{"event": "join_room"}"#).unwrap();
        match ev {
            ClientEvent::JoinRoom { room } => {
                assert_eq!(room.room_type, "group");
                assert!(room.room_name.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn dm_target_round_trips() {
        let ev: ClientEvent = serde_json::from_str(
            r#"{"event": "send_message", "room_type": "dm", "target": "bob", "content": "hi"}"#,
        )
        .unwrap();
        match ev {
            ClientEvent::SendMessage { room, content } => {
                assert_eq!(room.room_type, "dm");
                assert_eq!(room.target.as_deref(), Some("bob"));
                assert_eq!(content, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_events_carry_the_event_tag() {
        let json = serde_json::to_value(ServerEvent::RoomJoined {
            room: "group:lobby".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "room_joined");
        assert_eq!(json["room"], "group:lobby");

        let json = serde_json::to_value(ServerEvent::NotificationUpdate {
            update_type: "new_notification",
            count: 3,
        })
        .unwrap();
        assert_eq!(json["event"], "notification_update");
        assert_eq!(json["type"], "new_notification");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn message_broadcast_fields_are_inlined() {
        let json = serde_json::to_value(ServerEvent::Message(MessageBroadcast {
            id: 1,
            room: "group:lobby".into(),
            sender: "alice".into(),
            recipient: None,
            content: "@bob hi".into(),
            created_at: "2026-01-01T00:00:00.000000+05:30".into(),
            is_read: false,
            mentions: vec!["bob".into()],
        }))
        .unwrap();
        assert_eq!(json["event"], "message");
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["mentions"][0], "bob");
    }
}
