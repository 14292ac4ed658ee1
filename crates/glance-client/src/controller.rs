//! The messaging orchestrator.
//!
//! Owns the store, the composer state, the per-view attachment maps, and the
//! typing state machines; sequences validate → upload → send → reconcile →
//! navigate. Realtime and upload-engine events are applied through one event
//! pump so every mutation happens on the controller's lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, warn};

use glance_media::compress::prepare_image;
use glance_media::video::probe_video;
use glance_media::{
    validate_selection, AttachmentItem, ItemStatus, UploadEngine, UploadEvent, ValidatedFile,
};
use glance_net::RealtimeEvent;
use glance_shared::constants::COMPLETED_ITEM_GRACE_MS;
use glance_shared::{
    AttachmentId, AttachmentStatus, AttachmentType, AuthSession, Conversation, ConversationId,
    CreateUploadSessionRequest, ItemId, Message, SelectedFile, SendMessageRequest, TypingEvent,
};
use glance_store::{ConversationStore, PreviewOutcome};

use crate::composer;
use crate::events::{UiEmitter, UiEvent};
use crate::gateway::{MessageGateway, TypingPublisher};
use crate::typing::{TypingCoordinator, TypingDisplay};

pub const ERR_LOAD_CONVERSATIONS: &str = "Unable to load conversations.";
pub const ERR_LOAD_MESSAGES: &str = "Unable to load messages.";
pub const ERR_SEND_FAILED: &str = "Failed to send message.";
pub const ERR_UPLOAD_SESSION_FAILED: &str = "Failed to start attachment upload.";

pub struct MessengerController {
    auth: Arc<dyn AuthSession>,
    gateway: Arc<dyn MessageGateway>,
    typing_publisher: Arc<dyn TypingPublisher>,
    engine: UploadEngine,
    store: ConversationStore,
    ui: UiEmitter,

    recipient_input: String,
    message_input: String,
    is_composing_new: bool,
    is_sending: bool,
    is_loading_conversations: bool,
    is_loading_messages: bool,
    conversations_error: Option<String>,
    messages_error: Option<String>,
    send_error: Option<String>,
    attachment_error: Option<String>,

    attachments: Vec<AttachmentItem>,
    // Scoped to one messaging view; cleared in teardown.
    progress_by_attachment: HashMap<AttachmentId, u8>,
    item_by_attachment: HashMap<AttachmentId, ItemId>,

    typing: TypingCoordinator,
    typing_display: TypingDisplay,
    completed_removals: Vec<(ItemId, Instant)>,
}

impl MessengerController {
    pub fn new(
        auth: Arc<dyn AuthSession>,
        gateway: Arc<dyn MessageGateway>,
        typing_publisher: Arc<dyn TypingPublisher>,
        engine: UploadEngine,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (ui, ui_rx) = UiEmitter::channel();
        (
            Self {
                auth,
                gateway,
                typing_publisher,
                engine,
                store: ConversationStore::new(),
                ui,
                recipient_input: String::new(),
                message_input: String::new(),
                is_composing_new: false,
                is_sending: false,
                is_loading_conversations: false,
                is_loading_messages: false,
                conversations_error: None,
                messages_error: None,
                send_error: None,
                attachment_error: None,
                attachments: Vec::new(),
                progress_by_attachment: HashMap::new(),
                item_by_attachment: HashMap::new(),
                typing: TypingCoordinator::new(),
                typing_display: TypingDisplay::new(),
                completed_removals: Vec::new(),
            },
            ui_rx,
        )
    }

    // -- accessors ----------------------------------------------------------

    pub fn current_username(&self) -> Option<String> {
        self.auth.username()
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.store.conversations()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.store.selected_conversation()
    }

    pub fn selected_conversation_id(&self) -> Option<ConversationId> {
        self.store.selected()
    }

    pub fn attachments(&self) -> &[AttachmentItem] {
        &self.attachments
    }

    pub fn is_sending(&self) -> bool {
        self.is_sending
    }

    pub fn is_composing_new(&self) -> bool {
        self.is_composing_new
    }

    pub fn is_loading_conversations(&self) -> bool {
        self.is_loading_conversations
    }

    pub fn is_loading_messages(&self) -> bool {
        self.is_loading_messages
    }

    pub fn conversations_error(&self) -> Option<&str> {
        self.conversations_error.as_deref()
    }

    pub fn messages_error(&self) -> Option<&str> {
        self.messages_error.as_deref()
    }

    pub fn send_error(&self) -> Option<&str> {
        self.send_error.as_deref()
    }

    pub fn attachment_error(&self) -> Option<&str> {
        self.attachment_error.as_deref()
    }

    pub fn recipient_input(&self) -> &str {
        &self.recipient_input
    }

    pub fn message_input(&self) -> &str {
        &self.message_input
    }

    pub fn upload_progress(&self, attachment_id: AttachmentId) -> Option<u8> {
        self.progress_by_attachment.get(&attachment_id).copied()
    }

    /// Resolve a server attachment id back to the local draft it came from,
    /// for rendering upload state inside the message bubble.
    pub fn item_for_attachment(&self, attachment_id: AttachmentId) -> Option<&AttachmentItem> {
        let item_id = self.item_by_attachment.get(&attachment_id)?;
        self.attachments.iter().find(|item| item.id == *item_id)
    }

    /// Username currently typing in the open conversation, if any.
    pub fn typing_indicator(&self) -> Option<&str> {
        self.typing_display.current().map(|(_, username)| username)
    }

    pub fn is_outgoing(&self, message: &Message) -> bool {
        self.auth
            .username()
            .is_some_and(|me| me == message.sender_username)
    }

    /// Sidebar preview line, prefixed with "You: " for own messages.
    pub fn conversation_preview(&self, conversation: &Conversation) -> String {
        match conversation.last_message_preview.as_deref() {
            Some(preview) if !preview.is_empty() => {
                let mine = conversation.last_message_sender_username.as_deref()
                    == self.auth.username().as_deref();
                if mine {
                    format!("You: {preview}")
                } else {
                    preview.to_string()
                }
            }
            _ => "Say hello and start the conversation.".to_string(),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    pub async fn init(&mut self) {
        self.load_conversations().await;
    }

    pub async fn load_conversations(&mut self) {
        self.is_loading_conversations = true;
        self.conversations_error = None;
        match self.gateway.conversations().await {
            Ok(conversations) => {
                self.store.replace_conversations(conversations);
            }
            Err(e) => {
                error!(error = %e, "failed to load conversations");
                self.conversations_error = Some(ERR_LOAD_CONVERSATIONS.to_string());
            }
        }
        self.is_loading_conversations = false;
    }

    /// Route change: open a conversation or return to the blank state.
    pub async fn open_conversation(&mut self, conversation_id: Option<ConversationId>) {
        self.store.select(conversation_id);
        match conversation_id {
            Some(id) => {
                self.is_composing_new = false;
                self.load_messages(id).await;
            }
            None => {
                self.store.clear_messages();
                self.messages_error = None;
                self.send_error = None;
            }
        }
    }

    pub async fn load_messages(&mut self, conversation_id: ConversationId) {
        self.is_loading_messages = true;
        self.messages_error = None;
        match self.gateway.messages(conversation_id).await {
            Ok(messages) => {
                self.store.replace_messages(messages);
                self.is_loading_messages = false;
                self.ui.emit(UiEvent::ScrollToBottom);
                self.mark_conversation_read(conversation_id).await;
            }
            Err(e) => {
                error!(error = %e, conversation = %conversation_id, "failed to load messages");
                self.is_loading_messages = false;
                self.messages_error = Some(ERR_LOAD_MESSAGES.to_string());
            }
        }
    }

    pub async fn select_conversation(&mut self, conversation_id: ConversationId) {
        if self.store.selected() == Some(conversation_id) {
            return;
        }
        self.stop_typing_signal().await;
        self.typing_display.clear();
        self.ui.emit(UiEvent::NavigateToConversation(conversation_id));
        self.open_conversation(Some(conversation_id)).await;
    }

    pub async fn start_new_message(&mut self) {
        self.stop_typing_signal().await;
        self.typing_display.clear();
        self.ui.emit(UiEvent::NavigateToInbox);
        self.store.select(None);
        self.store.clear_messages();
        self.messages_error = None;
        self.send_error = None;
        self.is_composing_new = true;
        self.recipient_input.clear();
        self.message_input.clear();
    }

    /// Clear every per-view resource. Called when the messaging view is
    /// destroyed; no timer or worker may fire afterwards.
    pub async fn teardown(&mut self) {
        self.stop_typing_signal().await;
        self.typing_display.clear();
        self.engine.shutdown();
        self.attachments.clear();
        self.progress_by_attachment.clear();
        self.item_by_attachment.clear();
        self.completed_removals.clear();
    }

    // -- composer -----------------------------------------------------------

    pub fn set_recipient_input(&mut self, text: impl Into<String>) {
        self.recipient_input = text.into();
    }

    pub fn set_message_input(&mut self, text: impl Into<String>) {
        self.message_input = text.into();
    }

    /// Composer keystroke: maybe broadcast `typing=true`.
    pub async fn on_message_input(&mut self) {
        let Some(conversation_id) = self.store.selected() else {
            return;
        };
        if let Some(target) = self.typing.on_input(conversation_id, Instant::now()) {
            self.typing_publisher.publish_typing(target, true).await;
        }
    }

    /// Composer lost focus: an active typing signal stops immediately.
    pub async fn on_composer_blur(&mut self) {
        self.stop_typing_signal().await;
    }

    /// Composer keydown: Enter sends when the message is sendable,
    /// shift+Enter falls through to the input.
    pub async fn on_message_keydown(&mut self, key: &str, shift_held: bool) {
        if composer::should_send_on_enter(key, shift_held) && self.can_send() {
            self.send_message().await;
        }
    }

    fn resolved_recipient(&self) -> String {
        match self.store.selected_conversation() {
            Some(conversation) => conversation.participant_username.clone(),
            None => self.recipient_input.trim().to_string(),
        }
    }

    pub fn can_send(&self) -> bool {
        let has_body =
            !self.message_input.trim().is_empty() || !self.attachments.is_empty();
        !self.resolved_recipient().is_empty() && has_body && !self.is_sending
    }

    // -- sending ------------------------------------------------------------

    pub async fn send_message(&mut self) {
        if self.is_sending {
            return;
        }
        let recipient = self.resolved_recipient();
        let content = self.message_input.trim().to_string();
        if let Err(message) =
            composer::validate(&recipient, &content, !self.attachments.is_empty())
        {
            self.send_error = Some(message);
            return;
        }

        self.stop_typing_signal().await;
        self.is_sending = true;
        self.send_error = None;

        let has_drafts = self
            .attachments
            .iter()
            .any(|item| item.status == ItemStatus::Draft);
        if has_drafts {
            self.send_with_attachments(recipient, content).await;
        } else {
            self.send_plain(recipient, content).await;
        }
        self.is_sending = false;
    }

    async fn send_plain(&mut self, recipient: String, content: String) {
        let request = SendMessageRequest {
            recipient_username: recipient,
            content,
        };
        match self.gateway.send_message(request).await {
            Ok(message) => {
                self.message_input.clear();
                self.after_send_success(message).await;
            }
            Err(e) => {
                error!(error = %e, "failed to send message");
                self.send_error = Some(ERR_SEND_FAILED.to_string());
            }
        }
    }

    async fn send_with_attachments(&mut self, recipient: String, content: String) {
        let draft_ids: Vec<ItemId> = self
            .attachments
            .iter()
            .filter(|item| item.status == ItemStatus::Draft)
            .map(|item| item.id)
            .collect();
        let request = CreateUploadSessionRequest {
            recipient_username: recipient,
            content: (!content.is_empty()).then_some(content),
            expires_in_seconds: None,
            attachments: self
                .attachments
                .iter()
                .filter(|item| item.status == ItemStatus::Draft)
                .map(AttachmentItem::upload_request)
                .collect(),
        };

        match self.gateway.create_upload_sessions(request).await {
            Ok(response) => {
                self.message_input.clear();
                self.after_send_success(response.message).await;

                // Sessions map onto drafts by array position.
                for (item_id, session) in draft_ids.iter().zip(response.uploads.iter()) {
                    if let Some(item) = self.attachments.iter_mut().find(|i| i.id == *item_id) {
                        item.attach_session(session);
                        item.status = ItemStatus::Uploading;
                        item.error = None;
                        item.progress = 0;
                        self.item_by_attachment.insert(session.attachment_id, *item_id);
                        self.progress_by_attachment.insert(session.attachment_id, 0);
                    }
                }
                if response.uploads.len() != draft_ids.len() {
                    warn!(
                        drafts = draft_ids.len(),
                        sessions = response.uploads.len(),
                        "upload session count does not match draft count"
                    );
                }
                for item_id in &draft_ids {
                    if let Some(item) = self.attachments.iter().find(|i| i.id == *item_id) {
                        self.engine.start_upload(item);
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "failed to create upload sessions");
                self.send_error = Some(ERR_UPLOAD_SESSION_FAILED.to_string());
            }
        }
    }

    async fn after_send_success(&mut self, message: Message) {
        let conversation_id = message.conversation_id;
        self.store.upsert_message(message);
        if self.store.selected() != Some(conversation_id) {
            self.recipient_input.clear();
            self.is_composing_new = false;
            self.store.select(Some(conversation_id));
            self.ui.emit(UiEvent::NavigateToConversation(conversation_id));
        } else {
            self.ui.emit(UiEvent::ScrollToBottom);
        }
        self.load_conversations().await;
    }

    // -- attachments --------------------------------------------------------

    /// Validate and ingest a file selection. Images are re-encoded on a
    /// blocking thread; videos get a passive metadata probe.
    pub async fn attach_files(&mut self, files: Vec<SelectedFile>) {
        self.attachment_error = None;
        let outcome = validate_selection(self.attachments.len(), files);
        if let Some(error) = outcome.error {
            self.attachment_error = Some(error);
        }
        for validated in outcome.accepted {
            let item = build_item(validated).await;
            self.attachments.push(item);
        }
    }

    /// Remove a draft, or cancel its upload when it is already in flight
    /// (removal then happens once the cancel is confirmed).
    pub fn remove_attachment(&mut self, item_id: ItemId) {
        let Some(item) = self.attachments.iter().find(|i| i.id == item_id) else {
            return;
        };
        match item.status {
            ItemStatus::Uploading | ItemStatus::Finalizing => {
                self.cancel_upload(item_id);
            }
            _ => self.drop_item(item_id),
        }
    }

    pub fn cancel_upload(&mut self, item_id: ItemId) {
        if !self.engine.cancel_upload(item_id) {
            debug!(item = %item_id, "no live worker to cancel, removing draft");
            self.drop_item(item_id);
        }
    }

    /// Retry a failed upload, reusing the session it already holds.
    pub fn retry_upload(&mut self, item_id: ItemId) {
        let Some(item) = self.attachments.iter_mut().find(|i| i.id == item_id) else {
            return;
        };
        if item.status != ItemStatus::Failed || !item.has_session() {
            return;
        }
        item.status = ItemStatus::Uploading;
        item.error = None;
        item.progress = 0;
        let snapshot = item.clone();
        self.engine.start_upload(&snapshot);
    }

    fn drop_item(&mut self, item_id: ItemId) {
        if let Some(position) = self.attachments.iter().position(|i| i.id == item_id) {
            let item = self.attachments.remove(position);
            if let Some(attachment_id) = item.attachment_id {
                self.progress_by_attachment.remove(&attachment_id);
                self.item_by_attachment.remove(&attachment_id);
            }
        }
        self.completed_removals.retain(|(id, _)| *id != item_id);
    }

    // -- realtime -----------------------------------------------------------

    /// Apply a pushed message. Attachment-progress bookkeeping always syncs;
    /// the visible list only changes when the message belongs to the open
    /// conversation; the conversation list always updates.
    pub async fn handle_incoming_message(&mut self, message: Message) {
        if let Some(attachments) = &message.attachments {
            for attachment in attachments {
                if attachment.status != AttachmentStatus::Uploading {
                    self.progress_by_attachment.remove(&attachment.id);
                }
            }
        }

        let is_active = self.store.selected() == Some(message.conversation_id);
        if is_active {
            self.store.upsert_message(message.clone());
            self.ui.emit(UiEvent::ScrollToBottom);
            if !self.is_outgoing(&message) {
                self.mark_conversation_read(message.conversation_id).await;
            }
        }

        let self_username = self.auth.username();
        match self.store.apply_preview(&message, self_username.as_deref()) {
            PreviewOutcome::Applied => {}
            PreviewOutcome::ConversationMissing => self.load_conversations().await,
        }
    }

    pub fn handle_typing_event(&mut self, event: TypingEvent) {
        let self_username = self.auth.username();
        self.typing_display.apply(
            &event,
            self_username.as_deref(),
            self.store.selected(),
            Instant::now(),
        );
    }

    // -- upload events ------------------------------------------------------

    pub fn apply_upload_event(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Started { item_id } => {
                self.set_item_status(item_id, ItemStatus::Uploading);
            }
            UploadEvent::Progress {
                item_id,
                attachment_id,
                percent,
            } => {
                self.progress_by_attachment.insert(attachment_id, percent);
                if let Some(item) = self.attachments.iter_mut().find(|i| i.id == item_id) {
                    item.progress = percent;
                }
            }
            UploadEvent::Finalizing { item_id } => {
                self.set_item_status(item_id, ItemStatus::Finalizing);
            }
            UploadEvent::Completed {
                item_id,
                attachment,
            } => {
                if let Some(item) = self.attachments.iter_mut().find(|i| i.id == item_id) {
                    item.status = ItemStatus::Complete;
                    item.progress = 100;
                }
                self.progress_by_attachment.remove(&attachment.id);
                // Leave the completed row visible for a moment instead of
                // snapping it away.
                self.completed_removals.push((
                    item_id,
                    Instant::now() + Duration::from_millis(COMPLETED_ITEM_GRACE_MS),
                ));
            }
            UploadEvent::Failed { item_id, error } => {
                if let Some(item) = self.attachments.iter_mut().find(|i| i.id == item_id) {
                    item.status = ItemStatus::Failed;
                    item.error = Some(error);
                }
            }
            UploadEvent::Cancelled { item_id } => {
                self.drop_item(item_id);
            }
        }
    }

    fn set_item_status(&mut self, item_id: ItemId, status: ItemStatus) {
        if let Some(item) = self.attachments.iter_mut().find(|i| i.id == item_id) {
            item.status = status;
        }
    }

    // -- timers -------------------------------------------------------------

    /// Earliest pending deadline: typing idle stop, indicator expiry, or a
    /// completed-item removal.
    pub fn next_deadline(&self) -> Option<Instant> {
        let removals = self.completed_removals.iter().map(|(_, at)| *at).min();
        [self.typing.idle_deadline(), self.typing_display.deadline(), removals]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fire every deadline at or before `now`.
    pub async fn tick(&mut self, now: Instant) {
        if let Some(conversation) = self.typing.on_idle(now) {
            self.typing_publisher.publish_typing(conversation, false).await;
        }
        self.typing_display.expire(now);

        let due: Vec<ItemId> = self
            .completed_removals
            .iter()
            .filter(|(_, at)| *at <= now)
            .map(|(id, _)| *id)
            .collect();
        for item_id in due {
            self.drop_item(item_id);
        }
    }

    // -- internals ----------------------------------------------------------

    async fn stop_typing_signal(&mut self) {
        if let Some(conversation) = self.typing.stop() {
            self.typing_publisher.publish_typing(conversation, false).await;
        }
    }

    async fn mark_conversation_read(&mut self, conversation_id: ConversationId) {
        match self.gateway.mark_read(conversation_id).await {
            Ok(()) => self.store.mark_read(conversation_id),
            Err(e) => {
                error!(error = %e, conversation = %conversation_id, "failed to mark conversation read");
            }
        }
    }
}

/// Ingest one validated file into a draft item.
async fn build_item(validated: ValidatedFile) -> AttachmentItem {
    let ValidatedFile { file, kind } = validated;
    match kind {
        AttachmentType::Image => {
            let input = file.clone();
            match tokio::task::spawn_blocking(move || prepare_image(&input)).await {
                Ok(prepared) => {
                    let mime = if prepared.was_compressed {
                        Some("image/jpeg".to_string())
                    } else {
                        file.mime_type.clone()
                    };
                    let mut item =
                        AttachmentItem::new(kind, file.file_name, mime, prepared.data);
                    item.width = prepared.width;
                    item.height = prepared.height;
                    item.was_compressed = prepared.was_compressed;
                    item
                }
                Err(e) => {
                    // Pre-processing must never block the upload.
                    warn!(error = %e, "image pre-processing panicked, sending original");
                    AttachmentItem::new(kind, file.file_name, file.mime_type, file.data)
                }
            }
        }
        AttachmentType::Video => {
            let meta = probe_video(&file.data).unwrap_or_default();
            let mut item =
                AttachmentItem::new(kind, file.file_name, file.mime_type, file.data);
            item.width = meta.width;
            item.height = meta.height;
            item.duration_seconds = meta.duration_seconds;
            item
        }
        AttachmentType::Document => {
            AttachmentItem::new(kind, file.file_name, file.mime_type, file.data)
        }
    }
}

/// Drive the controller from its event sources: realtime pushes, upload
/// worker events, and the deadline clock.
pub async fn run_event_loop(
    controller: Arc<Mutex<MessengerController>>,
    mut realtime: broadcast::Receiver<RealtimeEvent>,
    mut uploads: mpsc::UnboundedReceiver<UploadEvent>,
) {
    loop {
        let deadline = controller.lock().await.next_deadline();
        tokio::select! {
            event = realtime.recv() => match event {
                Ok(RealtimeEvent::Message(message)) => {
                    controller.lock().await.handle_incoming_message(message).await;
                }
                Ok(RealtimeEvent::Typing(event)) => {
                    controller.lock().await.handle_typing_event(event);
                }
                // Notification counts ride their own transport.
                Ok(RealtimeEvent::NotificationCount(_)) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            upload = uploads.recv() => match upload {
                Some(event) => controller.lock().await.apply_upload_event(event),
                None => break,
            },
            _ = sleep_until(deadline) => {
                controller.lock().await.tick(Instant::now()).await;
            }
        }
    }
    debug!("messenger event loop terminated");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            let now = Instant::now();
            tokio::time::sleep(deadline.saturating_duration_since(now)).await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;
    use glance_media::{ChunkTransport, ProgressFn};
    use glance_net::NetError;
    use glance_shared::{
        AttachmentStatus, AttachmentType, ChunkAck, CreateUploadSessionResponse,
        MessageAttachment, MessageId, StaticSession, UploadId, UploadSession,
    };
    use std::sync::Mutex as StdMutex;

    fn conversation(id: i64, participant: &str) -> Conversation {
        Conversation {
            id: ConversationId(id),
            participant_username: participant.into(),
            participant_full_name: None,
            participant_profile_picture_url: None,
            last_message_preview: None,
            last_message_at: None,
            last_message_sender_username: None,
            unread_count: 0,
        }
    }

    fn message(id: i64, conversation_id: i64, sender: &str, recipient: &str) -> Message {
        Message {
            id: MessageId(id),
            conversation_id: ConversationId(conversation_id),
            sender_username: sender.into(),
            recipient_username: recipient.into(),
            content: Some("hello".into()),
            attachments: None,
            created_at: Utc::now(),
            is_read: false,
            read_at: None,
        }
    }

    #[derive(Default)]
    struct GatewayState {
        conversations: Vec<Conversation>,
        messages: Vec<Message>,
        send_response: Option<Message>,
        session_response: Option<CreateUploadSessionResponse>,
        calls: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct MockGateway {
        state: Arc<StdMutex<GatewayState>>,
    }

    impl MockGateway {
        fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }
    }

    fn unavailable() -> NetError {
        NetError::Status {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[async_trait]
    impl MessageGateway for MockGateway {
        async fn conversations(&self) -> Result<Vec<Conversation>, NetError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("conversations".into());
            Ok(state.conversations.clone())
        }

        async fn messages(&self, _id: ConversationId) -> Result<Vec<Message>, NetError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("messages".into());
            Ok(state.messages.clone())
        }

        async fn mark_read(&self, _id: ConversationId) -> Result<(), NetError> {
            self.state.lock().unwrap().calls.push("mark_read".into());
            Ok(())
        }

        async fn send_message(&self, _request: SendMessageRequest) -> Result<Message, NetError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("send".into());
            state.send_response.clone().ok_or_else(unavailable)
        }

        async fn create_upload_sessions(
            &self,
            request: CreateUploadSessionRequest,
        ) -> Result<CreateUploadSessionResponse, NetError> {
            let mut state = self.state.lock().unwrap();
            state
                .calls
                .push(format!("sessions:{}", request.attachments.len()));
            state.session_response.clone().ok_or_else(unavailable)
        }
    }

    #[derive(Clone, Default)]
    struct MockPublisher {
        signals: Arc<StdMutex<Vec<(ConversationId, bool)>>>,
    }

    #[async_trait]
    impl TypingPublisher for MockPublisher {
        async fn publish_typing(&self, conversation_id: ConversationId, typing: bool) {
            self.signals.lock().unwrap().push((conversation_id, typing));
        }
    }

    #[derive(Clone, Default)]
    struct MockChunkTransport {
        chunks: Arc<StdMutex<Vec<(UploadId, u32)>>>,
    }

    #[async_trait]
    impl ChunkTransport for MockChunkTransport {
        async fn upload_chunk(
            &self,
            upload_id: &UploadId,
            chunk_index: u32,
            total_chunks: u32,
            _file_name: &str,
            _data: Bytes,
            _progress: Option<ProgressFn>,
        ) -> Result<ChunkAck, NetError> {
            self.chunks
                .lock()
                .unwrap()
                .push((upload_id.clone(), chunk_index));
            Ok(ChunkAck {
                upload_id: upload_id.clone(),
                uploaded_chunks: chunk_index + 1,
                total_chunks,
            })
        }

        async fn finalize(&self, _upload_id: &UploadId) -> Result<MessageAttachment, NetError> {
            Ok(MessageAttachment {
                id: AttachmentId(70),
                attachment_type: AttachmentType::Document,
                mime_type: None,
                size_bytes: 4,
                checksum: None,
                width: None,
                height: None,
                duration_seconds: None,
                alt_text: None,
                url: None,
                thumbnail_url: None,
                status: AttachmentStatus::Ready,
                expires_at: None,
                original_filename: None,
            })
        }

        async fn cancel(&self, _upload_id: &UploadId) -> Result<(), NetError> {
            Ok(())
        }
    }

    struct Harness {
        controller: MessengerController,
        ui_rx: mpsc::UnboundedReceiver<UiEvent>,
        upload_rx: mpsc::UnboundedReceiver<UploadEvent>,
        gateway: MockGateway,
        publisher: MockPublisher,
        chunks: MockChunkTransport,
    }

    fn harness() -> Harness {
        let gateway = MockGateway::default();
        let publisher = MockPublisher::default();
        let chunks = MockChunkTransport::default();
        let (engine, upload_rx) = UploadEngine::new(Arc::new(chunks.clone()));
        let (controller, ui_rx) = MessengerController::new(
            Arc::new(StaticSession::new("jwt", "me")),
            Arc::new(gateway.clone()),
            Arc::new(publisher.clone()),
            engine,
        );
        Harness {
            controller,
            ui_rx,
            upload_rx,
            gateway,
            publisher,
            chunks,
        }
    }

    fn drain_ui(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn document(name: &str) -> SelectedFile {
        SelectedFile {
            file_name: name.into(),
            mime_type: Some("application/pdf".into()),
            data: Bytes::from_static(b"%PDF"),
        }
    }

    #[tokio::test]
    async fn validation_runs_in_order_without_network_calls() {
        let mut h = harness();

        h.controller.set_recipient_input("");
        h.controller.set_message_input("hi");
        h.controller.send_message().await;
        assert_eq!(
            h.controller.send_error(),
            Some("Recipient username is required.")
        );

        h.controller.set_recipient_input("bob");
        h.controller.set_message_input("");
        h.controller.send_message().await;
        assert_eq!(
            h.controller.send_error(),
            Some("Message content or attachment is required.")
        );

        h.controller.set_message_input("a".repeat(2001));
        h.controller.send_message().await;
        assert!(h
            .controller
            .send_error()
            .unwrap()
            .starts_with("Message must be under"));

        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn plain_send_upserts_navigates_and_reloads() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.send_response = Some(message(11, 5, "me", "bob"));
            state.conversations = vec![conversation(5, "bob")];
        }
        h.controller.set_recipient_input("bob");
        h.controller.set_message_input("hello there");
        h.controller.send_message().await;

        assert_eq!(h.controller.send_error(), None);
        assert_eq!(h.controller.message_input(), "");
        assert_eq!(
            h.controller.selected_conversation_id(),
            Some(ConversationId(5))
        );
        assert_eq!(h.controller.messages().len(), 1);
        assert_eq!(h.gateway.calls(), vec!["send", "conversations"]);
        assert!(drain_ui(&mut h.ui_rx)
            .contains(&UiEvent::NavigateToConversation(ConversationId(5))));
    }

    #[tokio::test]
    async fn failed_send_sets_its_own_error_and_reenables() {
        let mut h = harness();
        h.controller.set_recipient_input("bob");
        h.controller.set_message_input("hello");
        h.controller.send_message().await;
        assert_eq!(h.controller.send_error(), Some("Failed to send message."));
        assert!(!h.controller.is_sending());
        assert_eq!(h.gateway.calls(), vec!["send"]);
    }

    #[tokio::test]
    async fn attachment_send_requests_one_session_batch_and_starts_uploads() {
        let mut h = harness();
        h.controller.attach_files(vec![document("notes.pdf")]).await;
        assert_eq!(h.controller.attachments().len(), 1);
        assert_eq!(h.controller.attachments()[0].status, ItemStatus::Draft);

        {
            let mut state = h.gateway.state.lock().unwrap();
            state.conversations = vec![conversation(5, "bob")];
            state.session_response = Some(CreateUploadSessionResponse {
                message: message(20, 5, "me", "bob"),
                uploads: vec![UploadSession {
                    upload_id: UploadId("u-9".into()),
                    attachment_id: AttachmentId(70),
                    upload_url: "/uploads/u-9".into(),
                    finalize_url: "/uploads/u-9/finalize".into(),
                    chunk_size_bytes: 2,
                }],
            });
        }
        h.controller.set_recipient_input("bob");
        h.controller.set_message_input("see attached");
        h.controller.send_message().await;

        assert_eq!(h.controller.send_error(), None);
        let calls = h.gateway.calls();
        assert_eq!(
            calls.iter().filter(|c| c.starts_with("sessions")).count(),
            1
        );
        assert!(calls.contains(&"sessions:1".to_string()));

        let item = &h.controller.attachments()[0];
        assert_eq!(item.status, ItemStatus::Uploading);
        assert_eq!(item.upload_id, Some(UploadId("u-9".into())));
        assert_eq!(
            h.controller.upload_progress(AttachmentId(70)),
            Some(0)
        );
        assert_eq!(
            h.controller
                .item_for_attachment(AttachmentId(70))
                .map(|i| i.id),
            Some(item.id)
        );

        // Drive the worker to completion through the event channel.
        loop {
            let event = h.upload_rx.recv().await.expect("upload events");
            let done = matches!(event, UploadEvent::Completed { .. });
            h.controller.apply_upload_event(event);
            if done {
                break;
            }
        }
        // 4 bytes at chunk size 2 -> chunks 0 and 1, one worker only.
        let chunk_calls = h.chunks.chunks.lock().unwrap().clone();
        assert_eq!(
            chunk_calls,
            vec![(UploadId("u-9".into()), 0), (UploadId("u-9".into()), 1)]
        );
        assert_eq!(
            h.controller.attachments()[0].status,
            ItemStatus::Complete
        );
    }

    #[tokio::test]
    async fn failed_session_request_sets_the_attachment_error() {
        let mut h = harness();
        h.controller.attach_files(vec![document("notes.pdf")]).await;
        h.controller.set_recipient_input("bob");
        h.controller.send_message().await;
        assert_eq!(
            h.controller.send_error(),
            Some("Failed to start attachment upload.")
        );
        // The draft survives for a retry.
        assert_eq!(h.controller.attachments()[0].status, ItemStatus::Draft);
    }

    #[tokio::test]
    async fn incoming_message_for_open_conversation_scrolls_and_marks_read() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.conversations = vec![conversation(1, "alice"), conversation(2, "bob")];
        }
        h.controller.init().await;
        h.controller.open_conversation(Some(ConversationId(1))).await;
        h.gateway.clear_calls();
        drain_ui(&mut h.ui_rx);

        h.controller
            .handle_incoming_message(message(30, 1, "alice", "me"))
            .await;

        assert_eq!(h.controller.messages().len(), 1);
        assert!(h.gateway.calls().contains(&"mark_read".to_string()));
        assert!(drain_ui(&mut h.ui_rx).contains(&UiEvent::ScrollToBottom));
        // Active conversation stays at zero unread and moves to the front.
        assert_eq!(h.controller.conversations()[0].id, ConversationId(1));
        assert_eq!(h.controller.conversations()[0].unread_count, 0);
    }

    #[tokio::test]
    async fn incoming_message_for_other_conversation_only_updates_the_list() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.conversations = vec![conversation(1, "alice"), conversation(2, "bob")];
        }
        h.controller.init().await;
        h.controller.open_conversation(Some(ConversationId(1))).await;
        h.gateway.clear_calls();

        h.controller
            .handle_incoming_message(message(31, 2, "bob", "me"))
            .await;

        assert!(h.controller.messages().is_empty());
        assert!(!h.gateway.calls().contains(&"mark_read".to_string()));
        assert_eq!(h.controller.conversations()[0].id, ConversationId(2));
        assert_eq!(h.controller.conversations()[0].unread_count, 1);
    }

    #[tokio::test]
    async fn unknown_conversation_triggers_a_self_healing_reload() {
        let mut h = harness();
        h.controller
            .handle_incoming_message(message(32, 99, "dave", "me"))
            .await;
        assert_eq!(h.gateway.calls(), vec!["conversations"]);
    }

    #[tokio::test]
    async fn completed_items_leave_after_the_grace_period() {
        let mut h = harness();
        h.controller.attach_files(vec![document("notes.pdf")]).await;
        let item_id = h.controller.attachments()[0].id;

        h.controller.apply_upload_event(UploadEvent::Completed {
            item_id,
            attachment: MessageAttachment {
                id: AttachmentId(70),
                attachment_type: AttachmentType::Document,
                mime_type: None,
                size_bytes: 4,
                checksum: None,
                width: None,
                height: None,
                duration_seconds: None,
                alt_text: None,
                url: None,
                thumbnail_url: None,
                status: AttachmentStatus::Ready,
                expires_at: None,
                original_filename: None,
            },
        });
        assert_eq!(h.controller.attachments()[0].status, ItemStatus::Complete);
        assert!(h.controller.next_deadline().is_some());

        h.controller
            .tick(Instant::now() + Duration::from_millis(COMPLETED_ITEM_GRACE_MS + 50))
            .await;
        assert!(h.controller.attachments().is_empty());
    }

    #[tokio::test]
    async fn typing_signals_start_and_stop_around_send() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.conversations = vec![conversation(1, "alice")];
            state.messages = vec![];
            state.send_response = Some(message(40, 1, "me", "alice"));
        }
        h.controller.init().await;
        h.controller.open_conversation(Some(ConversationId(1))).await;

        h.controller.set_message_input("h");
        h.controller.on_message_input().await;
        assert_eq!(
            h.publisher.signals.lock().unwrap().as_slice(),
            &[(ConversationId(1), true)]
        );

        h.controller.set_message_input("hi");
        h.controller.send_message().await;
        let signals = h.publisher.signals.lock().unwrap().clone();
        assert_eq!(
            signals,
            vec![(ConversationId(1), true), (ConversationId(1), false)]
        );
    }

    #[tokio::test]
    async fn blur_stops_an_active_typing_signal() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.conversations = vec![conversation(1, "alice")];
        }
        h.controller.init().await;
        h.controller.open_conversation(Some(ConversationId(1))).await;

        h.controller.on_message_input().await;
        h.controller.on_composer_blur().await;
        h.controller.on_composer_blur().await; // idempotent

        let signals = h.publisher.signals.lock().unwrap().clone();
        assert_eq!(
            signals,
            vec![(ConversationId(1), true), (ConversationId(1), false)]
        );
    }

    #[tokio::test]
    async fn typing_indicator_follows_inbound_events() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.conversations = vec![conversation(1, "alice")];
        }
        h.controller.init().await;
        h.controller.open_conversation(Some(ConversationId(1))).await;

        h.controller.handle_typing_event(TypingEvent {
            conversation_id: ConversationId(1),
            sender_username: "alice".into(),
            typing: true,
        });
        assert_eq!(h.controller.typing_indicator(), Some("alice"));

        h.controller.handle_typing_event(TypingEvent {
            conversation_id: ConversationId(1),
            sender_username: "alice".into(),
            typing: false,
        });
        assert_eq!(h.controller.typing_indicator(), None);
    }

    #[tokio::test]
    async fn teardown_clears_view_scoped_state() {
        let mut h = harness();
        h.controller.attach_files(vec![document("a.pdf")]).await;
        h.controller.apply_upload_event(UploadEvent::Progress {
            item_id: h.controller.attachments()[0].id,
            attachment_id: AttachmentId(70),
            percent: 40,
        });
        assert_eq!(h.controller.upload_progress(AttachmentId(70)), Some(40));

        h.controller.teardown().await;
        assert!(h.controller.attachments().is_empty());
        assert_eq!(h.controller.upload_progress(AttachmentId(70)), None);
    }

    #[tokio::test]
    async fn conversation_preview_prefixes_own_messages() {
        let h = harness();
        let mut c = conversation(1, "alice");
        assert_eq!(
            h.controller.conversation_preview(&c),
            "Say hello and start the conversation."
        );

        c.last_message_preview = Some("see you".into());
        c.last_message_sender_username = Some("alice".into());
        assert_eq!(h.controller.conversation_preview(&c), "see you");

        c.last_message_sender_username = Some("me".into());
        assert_eq!(h.controller.conversation_preview(&c), "You: see you");
    }

    #[tokio::test]
    async fn enter_sends_only_when_sendable() {
        let mut h = harness();
        {
            let mut state = h.gateway.state.lock().unwrap();
            state.send_response = Some(message(50, 3, "me", "bob"));
            state.conversations = vec![conversation(3, "bob")];
        }
        h.controller.set_recipient_input("bob");
        h.controller.set_message_input("hello");

        h.controller.on_message_keydown("Enter", true).await;
        assert!(h.gateway.calls().is_empty());

        h.controller.on_message_keydown("Enter", false).await;
        assert!(h.gateway.calls().contains(&"send".to_string()));
    }

    #[tokio::test]
    async fn attach_files_reports_batch_errors_but_keeps_valid_files() {
        let mut h = harness();
        h.controller
            .attach_files(vec![
                SelectedFile {
                    file_name: "weird.xyz".into(),
                    mime_type: None,
                    data: Bytes::from_static(b"??"),
                },
                document("fine.pdf"),
            ])
            .await;
        assert_eq!(h.controller.attachments().len(), 1);
        assert_eq!(
            h.controller.attachment_error(),
            Some("weird.xyz is not a supported type.")
        );
    }
}
