//! Typed decoding of realtime frame payloads.
//!
//! Payloads arrive as untyped JSON; each decoder either yields a typed event
//! or logs and drops the frame. A malformed payload never terminates the
//! subscription.

use tracing::{debug, error};

use glance_shared::constants::{TOPIC_MESSAGES, TOPIC_NOTIFICATION_COUNT, TOPIC_TYPING};
use glance_shared::{Message, NotificationCount, TypingEvent};

/// Events pushed by the broker, already decoded.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    Message(Message),
    Typing(TypingEvent),
    NotificationCount(i64),
}

/// Route a MESSAGE frame to the decoder for its destination.
pub fn decode_frame(destination: &str, body: &str) -> Option<RealtimeEvent> {
    match destination {
        TOPIC_MESSAGES => decode_message(body).map(RealtimeEvent::Message),
        TOPIC_TYPING => decode_typing(body).map(RealtimeEvent::Typing),
        TOPIC_NOTIFICATION_COUNT => decode_count(body).map(RealtimeEvent::NotificationCount),
        other => {
            debug!(destination = %other, "frame for unknown destination dropped");
            None
        }
    }
}

pub fn decode_message(body: &str) -> Option<Message> {
    match serde_json::from_str(body) {
        Ok(message) => Some(message),
        Err(e) => {
            error!(error = %e, "failed to parse realtime message payload");
            None
        }
    }
}

pub fn decode_typing(body: &str) -> Option<TypingEvent> {
    match serde_json::from_str(body) {
        Ok(event) => Some(event),
        Err(e) => {
            error!(error = %e, "failed to parse typing event payload");
            None
        }
    }
}

/// The count topic carries either a `{count}` object or a bare numeric string.
pub fn decode_count(body: &str) -> Option<i64> {
    if let Ok(payload) = serde_json::from_str::<NotificationCount>(body) {
        return Some(payload.count);
    }
    match body.trim().parse::<i64>() {
        Ok(count) => Some(count),
        Err(_) => {
            error!(body = %body, "failed to parse notification count payload");
            None
        }
    }
}
