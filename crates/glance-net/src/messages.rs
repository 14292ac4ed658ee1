//! The two realtime concerns: direct messages (plus typing) and the global
//! notification count.
//!
//! They are modeled as independently-lifecycled connections to the same
//! broker rather than one shared multiplexer, because the unread badge must
//! keep working while the messaging view is closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::error;

use glance_shared::constants::{
    DEFAULT_WS_URL, DESTINATION_TYPING, HEARTBEAT_INTERVAL_MS, RECONNECT_DELAY_MS, TOPIC_MESSAGES,
    TOPIC_NOTIFICATION_COUNT, TOPIC_TYPING,
};
use glance_shared::{AuthSession, ConversationId, TypingSignal};

use crate::decode::RealtimeEvent;
use crate::realtime::{RealtimeClient, RealtimeConfig};

/// Connection settings shared by both transports.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub heartbeat: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            heartbeat: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
        }
    }
}

impl TransportOptions {
    fn realtime_config(&self, subscriptions: Vec<String>) -> RealtimeConfig {
        RealtimeConfig {
            ws_url: self.ws_url.clone(),
            subscriptions,
            reconnect_delay: self.reconnect_delay,
            heartbeat: self.heartbeat,
        }
    }
}

/// Message-view transport: incoming messages and typing events, plus the
/// outbound typing destination.
pub struct MessageTransport {
    client: RealtimeClient,
}

impl MessageTransport {
    pub fn new(auth: Arc<dyn AuthSession>, options: &TransportOptions) -> Self {
        let config = options.realtime_config(vec![
            TOPIC_MESSAGES.to_string(),
            TOPIC_TYPING.to_string(),
        ]);
        Self {
            client: RealtimeClient::new(auth, config),
        }
    }

    pub async fn connect(&self) {
        self.client.connect().await;
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    pub fn is_active(&self) -> bool {
        self.client.is_active()
    }

    /// Decoded `Message` and `TypingEvent` pushes. Replay-free.
    pub fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.client.events()
    }

    pub async fn publish_typing(&self, conversation_id: ConversationId, typing: bool) {
        let signal = TypingSignal {
            conversation_id,
            typing,
        };
        match serde_json::to_string(&signal) {
            Ok(body) => self.client.publish(DESTINATION_TYPING, body).await,
            Err(e) => error!(error = %e, "failed to encode typing signal"),
        }
    }
}

/// Notification-count transport, independent of the messaging view.
pub struct NotificationTransport {
    client: RealtimeClient,
}

impl NotificationTransport {
    pub fn new(auth: Arc<dyn AuthSession>, options: &TransportOptions) -> Self {
        let config = options.realtime_config(vec![TOPIC_NOTIFICATION_COUNT.to_string()]);
        Self {
            client: RealtimeClient::new(auth, config),
        }
    }

    pub async fn connect(&self) {
        self.client.connect().await;
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    pub fn is_active(&self) -> bool {
        self.client.is_active()
    }

    /// Decoded unread-count pushes. Replay-free.
    pub fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.client.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glance_shared::StaticSession;

    #[test]
    fn default_options_point_at_the_fixed_backend() {
        let options = TransportOptions::default();
        assert_eq!(options.ws_url, DEFAULT_WS_URL);
        assert_eq!(options.reconnect_delay, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn transports_start_inactive() {
        let auth: Arc<dyn AuthSession> = Arc::new(StaticSession::anonymous());
        let messages = MessageTransport::new(Arc::clone(&auth), &TransportOptions::default());
        let notifications = NotificationTransport::new(auth, &TransportOptions::default());
        assert!(!messages.is_active());
        assert!(!notifications.is_active());
    }
}
