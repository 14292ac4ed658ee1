//! REST client for the messaging API.
//!
//! Thin typed wrapper over `reqwest`: every operation resolves to a value or
//! a [`NetError`]; callers map failures onto their own user-facing error
//! fields. Chunk uploads stream their multipart body so transfer progress is
//! observable while the request is in flight.

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tracing::debug;

use glance_shared::constants::MESSAGES_API_PATH;
use glance_shared::{
    AuthSession, ChunkAck, Conversation, ConversationId, CreateUploadSessionRequest,
    CreateUploadSessionResponse, Message, MessageAttachment, SendMessageRequest, UploadId,
};

use crate::error::NetError;
use crate::Result;

/// Callback invoked with the number of bytes of the current chunk handed to
/// the transport so far.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Sub-slice size for progress-reporting body streams.
const STREAM_SLICE_BYTES: usize = 64 * 1024;

pub struct MessageApi {
    http: reqwest::Client,
    base: String,
    auth: Arc<dyn AuthSession>,
}

impl MessageApi {
    pub fn new(auth: Arc<dyn AuthSession>, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base, MESSAGES_API_PATH, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(NetError::Status {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get_conversations(&self) -> Result<Vec<Conversation>> {
        let response = self
            .authorize(self.http.get(self.endpoint("/conversations")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let response = self
            .authorize(
                self.http
                    .get(self.endpoint(&format!("/conversations/{conversation_id}"))),
            )
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn mark_conversation_read(&self, conversation_id: ConversationId) -> Result<()> {
        let response = self
            .authorize(
                self.http
                    .put(self.endpoint(&format!("/conversations/{conversation_id}/read")))
                    .json(&serde_json::json!({})),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<Message> {
        let response = self
            .authorize(self.http.post(self.endpoint("")).json(request))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// One combined request creating the message plus an upload session per
    /// attachment. Either everything is created server-side or nothing is.
    pub async fn create_upload_sessions(
        &self,
        request: &CreateUploadSessionRequest,
    ) -> Result<CreateUploadSessionResponse> {
        let response = self
            .authorize(
                self.http
                    .post(self.endpoint("/attachments/sessions"))
                    .json(request),
            )
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn upload_chunk(
        &self,
        upload_id: &UploadId,
        chunk_index: u32,
        total_chunks: u32,
        file_name: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<ChunkAck> {
        let length = data.len() as u64;
        debug!(
            upload_id = %upload_id,
            chunk_index,
            total_chunks,
            bytes = length,
            "uploading chunk"
        );
        let body = reqwest::Body::wrap_stream(progress_stream(data, progress));
        let part = reqwest::multipart::Part::stream_with_length(body, length)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .authorize(
                self.http
                    .post(self.endpoint(&format!("/attachments/uploads/{upload_id}")))
                    .query(&[
                        ("chunkIndex", chunk_index.to_string()),
                        ("totalChunks", total_chunks.to_string()),
                    ])
                    .multipart(form),
            )
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn finalize_upload(&self, upload_id: &UploadId) -> Result<MessageAttachment> {
        let response = self
            .authorize(
                self.http
                    .post(self.endpoint(&format!("/attachments/uploads/{upload_id}/finalize"))),
            )
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Invalidate a server-side upload session. Best-effort on the cancel
    /// path; callers decide what a failure means for the local draft.
    pub async fn cancel_upload(&self, upload_id: &UploadId) -> Result<()> {
        let response = self
            .authorize(
                self.http
                    .delete(self.endpoint(&format!("/attachments/uploads/{upload_id}"))),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Re-yield `data` in small slices, reporting cumulative bytes after each
/// slice, so callers see progress during the transfer rather than one jump.
fn progress_stream(
    data: Bytes,
    progress: Option<ProgressFn>,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send {
    futures::stream::unfold((data, 0usize), move |(data, sent)| {
        let progress = progress.clone();
        async move {
            if sent >= data.len() {
                return None;
            }
            let end = (sent + STREAM_SLICE_BYTES).min(data.len());
            let slice = data.slice(sent..end);
            if let Some(callback) = &progress {
                callback(end as u64);
            }
            Some((Ok(slice), (data, end)))
        }
    })
}
