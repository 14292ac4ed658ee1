use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Server-assigned identifiers are plain integers on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AttachmentId(pub i64);

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-issued upload session key. Opaque string, never synthesized locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UploadId(pub String);

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-local attachment item id (UUID v4).
///
/// Lives in a different identifier space than [`AttachmentId`]: the item id
/// exists from file selection, the attachment id only once the server has
/// opened an upload session. The two are bridged by a lookup map, never
/// conflated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentType {
    Image,
    Video,
    Document,
}

/// Server-side lifecycle of a [`MessageAttachment`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentStatus {
    Uploading,
    Ready,
    Failed,
    Quarantined,
    Expired,
}

/// One direct-message thread with another user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub participant_username: String,
    #[serde(default)]
    pub participant_full_name: Option<String>,
    #[serde(default)]
    pub participant_profile_picture_url: Option<String>,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message_sender_username: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

/// A direct message as confirmed by the server.
///
/// Immutable once created except for read state and attachment status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_username: String,
    pub recipient_username: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<MessageAttachment>>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Server-confirmed attachment record. Created when an upload session is
/// opened; the client never invents these ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachment {
    pub id: AttachmentId,
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub status: AttachmentStatus,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub original_filename: Option<String>,
}

/// Transient typing notification. Never persisted; only drives display state
/// with a short expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_id: ConversationId,
    pub sender_username: String,
    pub typing: bool,
}

/// Outbound typing signal published to the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub conversation_id: ConversationId,
    pub typing: bool,
}

/// Unread-count push payload on the notification topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationCount {
    pub count: i64,
}

// ---------------------------------------------------------------------------
// REST request/response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_username: String,
    pub content: String,
}

/// Per-file metadata sent when opening an upload session batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUploadRequest {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// One combined request: message content plus metadata for every attachment.
/// Either the whole message is created server-side or nothing is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadSessionRequest {
    pub recipient_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
    pub attachments: Vec<AttachmentUploadRequest>,
}

/// Session handle returned per attachment, in request order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_id: UploadId,
    pub attachment_id: AttachmentId,
    pub upload_url: String,
    pub finalize_url: String,
    pub chunk_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadSessionResponse {
    pub message: Message,
    pub uploads: Vec<UploadSession>,
}

/// Acknowledgement for one uploaded chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub upload_id: UploadId,
    pub uploaded_chunks: u32,
    pub total_chunks: u32,
}

/// A file as handed over by the embedding UI at selection time.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_camel_case() {
        let json = r#"{
            "id": 7,
            "conversationId": 3,
            "senderUsername": "alice",
            "recipientUsername": "bob",
            "content": "hi",
            "createdAt": "2026-01-05T12:30:00Z",
            "isRead": false
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, MessageId(7));
        assert_eq!(message.conversation_id, ConversationId(3));
        assert!(!message.is_read);
        assert!(message.attachments.is_none());

        let out = serde_json::to_value(&message).unwrap();
        assert_eq!(out["isRead"], serde_json::json!(false));
        assert_eq!(out["senderUsername"], serde_json::json!("alice"));
    }

    #[test]
    fn attachment_status_uses_screaming_case() {
        let attachment: MessageAttachment = serde_json::from_str(
            r#"{
                "id": 12,
                "type": "IMAGE",
                "sizeBytes": 1024,
                "status": "UPLOADING"
            }"#,
        )
        .unwrap();
        assert_eq!(attachment.attachment_type, AttachmentType::Image);
        assert_eq!(attachment.status, AttachmentStatus::Uploading);

        let out = serde_json::to_string(&attachment).unwrap();
        assert!(out.contains("\"UPLOADING\""));
        assert!(out.contains("\"IMAGE\""));
    }

    #[test]
    fn upload_request_omits_absent_optionals() {
        let request = AttachmentUploadRequest {
            file_name: "photo.jpg".into(),
            mime_type: Some("image/jpeg".into()),
            size_bytes: 2048,
            checksum: None,
            width: None,
            height: None,
            duration_seconds: None,
            alt_text: None,
        };
        let out = serde_json::to_string(&request).unwrap();
        assert!(!out.contains("checksum"));
        assert!(!out.contains("durationSeconds"));
        assert!(out.contains("\"fileName\":\"photo.jpg\""));
    }

    #[test]
    fn item_ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }
}
