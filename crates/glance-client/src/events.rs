//! UI effect surface.
//!
//! The controller never touches the view directly; it emits typed events the
//! embedding UI reacts to (scrolling, routing).

use tokio::sync::mpsc;
use tracing::debug;

use glance_shared::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The active message list changed in a way that should pin the view to
    /// the latest entry.
    ScrollToBottom,
    /// Route to a conversation.
    NavigateToConversation(ConversationId),
    /// Route back to the conversation list / blank composer.
    NavigateToInbox,
}

#[derive(Clone)]
pub struct UiEmitter {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("ui event dropped, no listener attached");
        }
    }
}
