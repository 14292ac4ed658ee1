//! Async seams between the orchestrator and the network layer.
//!
//! The controller's send state machine is specified in terms of these two
//! traits so tests can drive it against recording mocks; the real
//! implementations delegate straight to `glance-net`.

use async_trait::async_trait;

use glance_net::{MessageApi, MessageTransport, NetError};
use glance_shared::{
    Conversation, ConversationId, CreateUploadSessionRequest, CreateUploadSessionResponse,
    Message, SendMessageRequest,
};

#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn conversations(&self) -> Result<Vec<Conversation>, NetError>;

    async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, NetError>;

    async fn mark_read(&self, conversation_id: ConversationId) -> Result<(), NetError>;

    async fn send_message(&self, request: SendMessageRequest) -> Result<Message, NetError>;

    async fn create_upload_sessions(
        &self,
        request: CreateUploadSessionRequest,
    ) -> Result<CreateUploadSessionResponse, NetError>;
}

#[async_trait]
impl MessageGateway for MessageApi {
    async fn conversations(&self) -> Result<Vec<Conversation>, NetError> {
        self.get_conversations().await
    }

    async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, NetError> {
        self.get_messages(conversation_id).await
    }

    async fn mark_read(&self, conversation_id: ConversationId) -> Result<(), NetError> {
        self.mark_conversation_read(conversation_id).await
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<Message, NetError> {
        MessageApi::send_message(self, &request).await
    }

    async fn create_upload_sessions(
        &self,
        request: CreateUploadSessionRequest,
    ) -> Result<CreateUploadSessionResponse, NetError> {
        MessageApi::create_upload_sessions(self, &request).await
    }
}

/// Outbound typing signal sink.
#[async_trait]
pub trait TypingPublisher: Send + Sync {
    async fn publish_typing(&self, conversation_id: ConversationId, typing: bool);
}

#[async_trait]
impl TypingPublisher for MessageTransport {
    async fn publish_typing(&self, conversation_id: ConversationId, typing: bool) {
        MessageTransport::publish_typing(self, conversation_id, typing).await;
    }
}
