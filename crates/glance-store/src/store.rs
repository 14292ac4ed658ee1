//! In-memory conversation and message state.
//!
//! Owned exclusively by the orchestrator. REST snapshots replace state
//! wholesale; realtime deltas are applied through idempotent upserts, so a
//! message arriving over both channels converges to one entry regardless of
//! order.

use tracing::debug;

use glance_shared::{Conversation, ConversationId, Message};

use crate::preview::build_preview;

/// Result of applying a message to the conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    Applied,
    /// The owning conversation is not known locally; the caller self-heals
    /// with a full conversation reload instead of inventing placeholder
    /// state.
    ConversationMissing,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    selected: Option<ConversationId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn selected(&self) -> Option<ConversationId> {
        self.selected
    }

    /// The selected conversation, if it exists in the current list.
    pub fn selected_conversation(&self) -> Option<&Conversation> {
        let id = self.selected?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn select(&mut self, conversation_id: Option<ConversationId>) {
        self.selected = conversation_id;
    }

    /// Wholesale replace from a REST snapshot.
    pub fn replace_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Wholesale replace of the active message list.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Insert or replace by id. Applying the same message twice leaves the
    /// list unchanged.
    pub fn upsert_message(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    /// Update the owning conversation's preview line, unread count, and
    /// position. The conversation moves to the front of the list.
    pub fn apply_preview(
        &mut self,
        message: &Message,
        self_username: Option<&str>,
    ) -> PreviewOutcome {
        let Some(index) = self
            .conversations
            .iter()
            .position(|c| c.id == message.conversation_id)
        else {
            debug!(
                conversation = %message.conversation_id,
                "message for unknown conversation, full reload needed"
            );
            return PreviewOutcome::ConversationMissing;
        };

        let is_outgoing = self_username.is_some_and(|me| me == message.sender_username);
        let is_active = self.selected == Some(message.conversation_id);

        let mut conversation = self.conversations.remove(index);
        conversation.last_message_preview = Some(build_preview(message));
        conversation.last_message_at = Some(message.created_at);
        conversation.last_message_sender_username = Some(message.sender_username.clone());
        if is_active {
            conversation.unread_count = 0;
        } else if !is_outgoing {
            conversation.unread_count += 1;
        }
        self.conversations.insert(0, conversation);
        PreviewOutcome::Applied
    }

    /// Zero the unread counter after the server confirmed the read.
    pub fn mark_read(&mut self, conversation_id: ConversationId) {
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.unread_count = 0;
        }
    }
}
