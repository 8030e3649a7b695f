use super::{NotificationChannel, OutboundMessage, OutboundNotification, RoomEvent};
use crate::error::RelayResult;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// Fans room events out to in-process subscribers
pub struct BroadcastNotifier {
    tx: broadcast::Sender<RoomEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: RoomEvent) {
        let room_id = event.room_id().to_string();
        if self.tx.send(event).is_err() {
            // no subscribers; the event is dropped
            debug!(room_id = %room_id, "room event had no subscribers");
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationChannel for BroadcastNotifier {
    async fn send_message(&self, message: OutboundMessage) -> RelayResult<()> {
        self.publish(RoomEvent::Message(message));
        Ok(())
    }

    async fn send_notification(&self, notification: OutboundNotification) -> RelayResult<()> {
        self.publish(RoomEvent::Notification(notification));
        Ok(())
    }
}
