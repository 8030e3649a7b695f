use super::{NotificationChannel, OutboundMessage, OutboundNotification, RoomEvent};
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Posts each room event as JSON to a webhook
pub struct HttpNotifier {
    url: String,
    client: Client,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> RelayResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn post(&self, event: &RoomEvent) -> RelayResult<()> {
        debug!(room_id = %event.room_id(), url = %self.url, "posting room event");
        let response = self.client.post(&self.url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::connectivity(
                self.url.clone(),
                format!("notification webhook returned {}", response.status()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for HttpNotifier {
    async fn send_message(&self, message: OutboundMessage) -> RelayResult<()> {
        self.post(&RoomEvent::Message(message)).await
    }

    async fn send_notification(&self, notification: OutboundNotification) -> RelayResult<()> {
        self.post(&RoomEvent::Notification(notification)).await
    }
}
