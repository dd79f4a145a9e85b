//! WebSocket event types and serialization
//!
//! Every frame on the live connection is a typed envelope discriminated
//! by a `type` field. Inbound frames decode once at the gateway
//! boundary into `ClientEvent`; the event router dispatches on an
//! exhaustive match.

use serde::{Deserialize, Serialize};
use storechat_shared::{MediaType, Role};
use time::OffsetDateTime;

use crate::catalog::ProductInfo;
use crate::store::messages::Message;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Send a chat message, optionally tagging a product or attaching media
    ChatMessage {
        #[serde(default)]
        message: String,
        product_id: Option<i64>,
        media_data: Option<MediaData>,
    },

    /// Typing state changed
    TypingIndicator {
        #[serde(default)]
        is_typing: bool,
    },

    /// Mark every unread message in the room as read
    MarkRead,

    /// Client-side heartbeat; answered directly with `heartbeat_ack`
    Heartbeat { timestamp: Option<String> },

    /// Informational only; the room was already joined at connect time
    JoinRoom,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client.
///
/// Also the payload carried on the broadcast bus, so it round-trips
/// through JSON for the distributed backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame after a successful handshake
    ConnectionEstablished {
        user_id: i64,
        user_name: String,
        message: String,
    },

    /// Error addressed to a single connection, never broadcast
    Error { message: String },

    /// New chat message fanned out to the room group
    ChatMessage { message: MessagePayload },

    /// Typing state, suppressed for the sender's own connection
    TypingStatus {
        user_id: i64,
        user_name: String,
        is_typing: bool,
        sender_role: Role,
        room_name: String,
    },

    /// A participant disconnected, suppressed for the leaver's own connection
    UserOffline {
        user_id: i64,
        user_name: String,
        #[serde(with = "time::serde::rfc3339")]
        disconnect_time: OffsetDateTime,
    },

    /// Room-level notification (currently: messages_read)
    Notification { notification: MessagesReadNotice },

    /// Server-side liveness tick
    Heartbeat {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },

    /// Direct reply to a client heartbeat
    HeartbeatAck {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        #[serde(with = "time::serde::rfc3339")]
        server_time: OffsetDateTime,
    },
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Media reference recorded with a message. The media store holds the
/// bytes; the engine only carries the pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaData {
    pub media_url: String,
    pub media_type: MediaType,
    #[serde(alias = "filename")]
    pub media_filename: Option<String>,
    /// Alias of `media_filename` kept for older clients
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl MediaData {
    /// Fill the `filename` alias before fanout.
    pub fn with_filename_alias(mut self) -> Self {
        self.filename = self.media_filename.clone();
        self
    }
}

/// Chat message as fanned out to the room group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: i64,
    pub room_name: String,
    #[serde(rename = "message")]
    pub body: String,
    pub user_id: i64,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub sender_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_data: Option<MediaData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_info: Option<ProductInfo>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Alias of `created_at` kept for older clients
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl MessagePayload {
    pub fn from_message(
        message: &Message,
        room_name: &str,
        product_info: Option<ProductInfo>,
    ) -> Self {
        let media_data = match (&message.media_url, message.media_type) {
            (Some(url), Some(media_type)) => Some(
                MediaData {
                    media_url: url.clone(),
                    media_type,
                    media_filename: message.media_filename.clone(),
                    filename: None,
                }
                .with_filename_alias(),
            ),
            _ => None,
        };

        Self {
            id: message.id,
            room_name: room_name.to_string(),
            body: message.body.clone(),
            user_id: message.user_id,
            user_name: message.user_name.clone(),
            user_email: message.user_email.clone(),
            sender_role: message.sender_role,
            product_id: message.product_id,
            media_data,
            product_info,
            created_at: message.created_at,
            timestamp: message.created_at,
        }
    }
}

/// Bulk read-receipt notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesReadNotice {
    #[serde(rename = "type")]
    pub kind: String,
    pub room_name: String,
    pub reader_id: i64,
    pub reader_name: String,
    pub message_ids: Vec<i64>,
    pub count: i64,
}

impl MessagesReadNotice {
    pub fn new(room_name: &str, reader_id: i64, reader_name: &str, message_ids: Vec<i64>) -> Self {
        let count = message_ids.len() as i64;
        Self {
            kind: "messages_read".to_string(),
            room_name: room_name.to_string(),
            reader_id,
            reader_name: reader_name.to_string(),
            message_ids,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_deserialization() {
        let json = r#"{"type":"chat_message","message":"hello","product_id":12}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::ChatMessage {
                message,
                product_id,
                media_data,
            } => {
                assert_eq!(message, "hello");
                assert_eq!(product_id, Some(12));
                assert!(media_data.is_none());
            }
            _ => panic!("Expected ChatMessage event"),
        }
    }

    #[test]
    fn test_media_data_filename_alias_accepted() {
        let json = r#"{
            "type": "chat_message",
            "message": "",
            "media_data": {"media_url": "/m/1.png", "media_type": "image", "filename": "cat.png"}
        }"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::ChatMessage { media_data, .. } => {
                let media = media_data.expect("media expected");
                assert_eq!(media.media_filename.as_deref(), Some("cat.png"));
                assert_eq!(media.media_type, MediaType::Image);
            }
            _ => panic!("Expected ChatMessage event"),
        }
    }

    #[test]
    fn test_typing_indicator_deserialization() {
        let json = r#"{"type":"typing_indicator","is_typing":true}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            ClientEvent::TypingIndicator { is_typing: true }
        ));
    }

    #[test]
    fn test_unit_variants_deserialize() {
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(r#"{"type":"mark_read"}"#).unwrap(),
            ClientEvent::MarkRead
        ));
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(r#"{"type":"join_room"}"#).unwrap(),
            ClientEvent::JoinRoom
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown_server"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_event_serialization() {
        let event = ServerEvent::Error {
            message: "Test error".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("Test error"));
    }

    #[test]
    fn test_server_event_round_trips_through_json() {
        // The distributed bus ships events as JSON; they must decode back.
        let event = ServerEvent::TypingStatus {
            user_id: 3,
            user_name: "Ana".to_string(),
            is_typing: true,
            sender_role: Role::Staff,
            room_name: "room-42".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_str(&json).unwrap();
        match decoded {
            ServerEvent::TypingStatus {
                user_id, is_typing, ..
            } => {
                assert_eq!(user_id, 3);
                assert!(is_typing);
            }
            _ => panic!("Expected TypingStatus"),
        }
    }

    #[test]
    fn test_messages_read_notice_shape() {
        let notice = MessagesReadNotice::new("room-42", 7, "Staff", vec![1, 2, 3]);
        let event = ServerEvent::Notification {
            notification: notice,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"notification""#));
        assert!(json.contains(r#""messages_read""#));
        assert!(json.contains(r#""count":3"#));
    }
}
