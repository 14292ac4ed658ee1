//! Client-local attachment drafts.

use bytes::Bytes;

use glance_shared::{
    AttachmentId, AttachmentType, AttachmentUploadRequest, ItemId, UploadId, UploadSession,
};

/// Client-side lifecycle of one attachment draft.
///
/// `Draft → Uploading → Finalizing → Complete`, with `Failed` reachable from
/// the two in-flight states and `Failed → Uploading` on retry. Cancellation
/// removes the item instead of transitioning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Draft,
    Uploading,
    Finalizing,
    Failed,
    Complete,
}

/// One attachment being composed or uploaded. Local to the messaging view;
/// never serialized to the server as-is.
#[derive(Debug, Clone)]
pub struct AttachmentItem {
    pub id: ItemId,
    pub data: Bytes,
    pub kind: AttachmentType,
    pub display_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub checksum: String,
    pub alt_text: Option<String>,
    pub was_compressed: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<u32>,
    pub status: ItemStatus,
    /// Aggregate upload progress, 0-100.
    pub progress: u8,
    pub upload_id: Option<UploadId>,
    pub attachment_id: Option<AttachmentId>,
    pub chunk_size_bytes: Option<u64>,
    pub error: Option<String>,
}

impl AttachmentItem {
    pub fn new(
        kind: AttachmentType,
        display_name: impl Into<String>,
        mime_type: Option<String>,
        data: Bytes,
    ) -> Self {
        let checksum = blake3::hash(&data).to_hex().to_string();
        let size_bytes = data.len() as u64;
        Self {
            id: ItemId::new(),
            data,
            kind,
            display_name: display_name.into(),
            mime_type,
            size_bytes,
            checksum,
            alt_text: None,
            was_compressed: false,
            width: None,
            height: None,
            duration_seconds: None,
            status: ItemStatus::Draft,
            progress: 0,
            upload_id: None,
            attachment_id: None,
            chunk_size_bytes: None,
            error: None,
        }
    }

    /// All three session fields must be present before a worker may start.
    pub fn has_session(&self) -> bool {
        self.upload_id.is_some() && self.attachment_id.is_some() && self.chunk_size_bytes.is_some()
    }

    /// Bind the server-issued session to this draft.
    pub fn attach_session(&mut self, session: &UploadSession) {
        self.upload_id = Some(session.upload_id.clone());
        self.attachment_id = Some(session.attachment_id);
        self.chunk_size_bytes = Some(session.chunk_size_bytes);
    }

    /// Metadata sent when requesting the upload-session batch.
    pub fn upload_request(&self) -> AttachmentUploadRequest {
        AttachmentUploadRequest {
            file_name: self.display_name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            checksum: Some(self.checksum.clone()),
            width: self.width,
            height: self.height,
            duration_seconds: self.duration_seconds,
            alt_text: self.alt_text.clone(),
        }
    }
}
