//! Room notification channel
//!
//! Delivery is fire-and-forget: the engine logs a failed send and moves on, it never waits for
//! or consumes a delivery confirmation.

pub mod broadcast;
pub mod http;

use crate::error::RelayResult;
use crate::persistence::UserRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use broadcast::BroadcastNotifier;
pub use http::HttpNotifier;

/// A chat message posted into a room on behalf of `sender`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub created_at: String,
    pub sender: UserRecord,
    pub content: String,
    pub avatar: Option<String>,
    pub room_id: String,
    #[serde(default)]
    pub mentions: Vec<String>,
}

impl OutboundMessage {
    pub fn new(
        room_id: impl Into<String>,
        sender: UserRecord,
        content: impl Into<String>,
        created_at: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at,
            avatar: sender.avatar.clone(),
            sender,
            content: content.into(),
            room_id: room_id.into(),
            mentions: Vec::new(),
        }
    }
}

/// A lightweight room notification, usually pointing at a plan that changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundNotification {
    pub id: String,
    pub notification_id: String,
    pub room_id: String,
    pub message: String,
    pub sender: Option<String>,
    pub created_at: String,
    pub updating_plan: Option<String>,
}

impl OutboundNotification {
    pub fn new(
        room_id: impl Into<String>,
        message: impl Into<String>,
        sender: Option<String>,
        updating_plan: Option<String>,
        created_at: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            notification_id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            message: message.into(),
            sender,
            created_at,
            updating_plan,
        }
    }
}

/// Everything the engine pushes to a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RoomEvent {
    Message(OutboundMessage),
    Notification(OutboundNotification),
}

impl RoomEvent {
    pub fn room_id(&self) -> &str {
        match self {
            RoomEvent::Message(m) => &m.room_id,
            RoomEvent::Notification(n) => &n.room_id,
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send_message(&self, message: OutboundMessage) -> RelayResult<()>;

    async fn send_notification(&self, notification: OutboundNotification) -> RelayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_kind() {
        let event = RoomEvent::Notification(OutboundNotification::new(
            "room",
            "Task t1 has been created",
            Some("u1".to_string()),
            Some("p1".to_string()),
            "2025-01-01T08:00:00+08:00".to_string(),
        ));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "notification");
        assert_eq!(value["updating_plan"], "p1");
        assert_eq!(event.room_id(), "room");
    }

    #[test]
    fn message_avatar_follows_sender() {
        let sender = UserRecord {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            avatar: Some("a.png".to_string()),
            ..UserRecord::default()
        };
        let message = OutboundMessage::new("room", sender, "hello", "now".to_string());
        assert_eq!(message.avatar.as_deref(), Some("a.png"));
        assert!(message.mentions.is_empty());
    }
}
