//! Transport seam for the upload engine.
//!
//! The engine only needs three operations; putting them behind a trait keeps
//! the chunk loop testable against a recording mock and lets the REST client
//! satisfy it without the engine knowing about HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use glance_net::{MessageApi, NetError};
use glance_shared::{ChunkAck, MessageAttachment, UploadId};

/// Bytes-of-current-chunk progress callback.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn upload_chunk(
        &self,
        upload_id: &UploadId,
        chunk_index: u32,
        total_chunks: u32,
        file_name: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<ChunkAck, NetError>;

    async fn finalize(&self, upload_id: &UploadId) -> Result<MessageAttachment, NetError>;

    async fn cancel(&self, upload_id: &UploadId) -> Result<(), NetError>;
}

#[async_trait]
impl ChunkTransport for MessageApi {
    async fn upload_chunk(
        &self,
        upload_id: &UploadId,
        chunk_index: u32,
        total_chunks: u32,
        file_name: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<ChunkAck, NetError> {
        MessageApi::upload_chunk(
            self,
            upload_id,
            chunk_index,
            total_chunks,
            file_name,
            data,
            progress,
        )
        .await
    }

    async fn finalize(&self, upload_id: &UploadId) -> Result<MessageAttachment, NetError> {
        self.finalize_upload(upload_id).await
    }

    async fn cancel(&self, upload_id: &UploadId) -> Result<(), NetError> {
        self.cancel_upload(upload_id).await
    }
}
