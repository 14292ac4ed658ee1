//! Chunked upload engine.
//!
//! One worker task per attachment item. Chunks within an item upload
//! strictly sequentially; independent items run concurrently. Cancellation
//! is cooperative: the signal aborts the in-flight chunk call, short-circuits
//! the loop before the next chunk, and triggers a best-effort server-side
//! session cancel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use glance_shared::{AttachmentId, ItemId, MessageAttachment, UploadId};

use crate::item::AttachmentItem;
use crate::transport::{ChunkTransport, ProgressFn};

/// Generic user-facing failure message for chunk/finalize errors.
pub const UPLOAD_FAILED_MESSAGE: &str = "Attachment upload failed.";
/// User-facing message when a cancel could not be confirmed server-side.
pub const UPLOAD_CANCELLED_MESSAGE: &str = "Upload cancelled.";

/// Cooperative cancellation shared between the chunk loop and whoever owns
/// the item. Cloning hands out another handle to the same signal.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the signal fires. Returns immediately when already fired.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Worker notifications, consumed by the orchestrator which owns the draft
/// list and applies the transitions.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// A worker accepted the item; it is now `Uploading`.
    Started { item_id: ItemId },
    Progress {
        item_id: ItemId,
        attachment_id: AttachmentId,
        percent: u8,
    },
    Finalizing { item_id: ItemId },
    Completed {
        item_id: ItemId,
        attachment: MessageAttachment,
    },
    Failed { item_id: ItemId, error: String },
    /// Cancel confirmed server-side; the draft should be removed.
    Cancelled { item_id: ItemId },
}

struct Worker {
    cancel: CancelSignal,
    task: JoinHandle<()>,
}

pub struct UploadEngine {
    transport: Arc<dyn ChunkTransport>,
    events: mpsc::UnboundedSender<UploadEvent>,
    workers: Arc<Mutex<HashMap<ItemId, Worker>>>,
}

impl UploadEngine {
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
    ) -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                transport,
                events,
                workers: Arc::new(Mutex::new(HashMap::new())),
            },
            events_rx,
        )
    }

    /// Start (or retry) the upload for one item.
    ///
    /// Silently ignores items whose session fields are not all present yet;
    /// the UI may request an upload before the session response has been
    /// applied. Also ignores items that already have a live worker.
    pub fn start_upload(&self, item: &AttachmentItem) {
        let (Some(upload_id), Some(attachment_id), Some(chunk_size_bytes)) = (
            item.upload_id.clone(),
            item.attachment_id,
            item.chunk_size_bytes,
        ) else {
            debug!(item = %item.id, "upload session not ready, ignoring start");
            return;
        };

        let mut workers = self.lock_workers();
        if let Some(worker) = workers.get(&item.id) {
            if !worker.task.is_finished() {
                debug!(item = %item.id, "upload worker already active");
                return;
            }
        }

        let spec = UploadSpec {
            item_id: item.id,
            upload_id,
            attachment_id,
            chunk_size_bytes,
            file_name: item.display_name.clone(),
            data: item.data.clone(),
        };
        let cancel = CancelSignal::new();
        let task = tokio::spawn(run_worker(
            Arc::clone(&self.transport),
            spec,
            cancel.clone(),
            self.events.clone(),
            Arc::clone(&self.workers),
        ));
        workers.insert(item.id, Worker { cancel, task });
    }

    /// Fire the cancel signal for an item's worker. Returns whether a live
    /// worker was found.
    pub fn cancel_upload(&self, item_id: ItemId) -> bool {
        let workers = self.lock_workers();
        match workers.get(&item_id) {
            Some(worker) => {
                worker.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_uploading(&self, item_id: ItemId) -> bool {
        self.lock_workers()
            .get(&item_id)
            .is_some_and(|worker| !worker.task.is_finished())
    }

    /// Abort every worker. Used on view teardown.
    pub fn shutdown(&self) {
        let mut workers = self.lock_workers();
        for (item_id, worker) in workers.drain() {
            debug!(item = %item_id, "aborting upload worker");
            worker.cancel.cancel();
            worker.task.abort();
        }
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, HashMap<ItemId, Worker>> {
        self.workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct UploadSpec {
    item_id: ItemId,
    upload_id: UploadId,
    attachment_id: AttachmentId,
    chunk_size_bytes: u64,
    file_name: String,
    data: Bytes,
}

async fn run_worker(
    transport: Arc<dyn ChunkTransport>,
    spec: UploadSpec,
    cancel: CancelSignal,
    events: mpsc::UnboundedSender<UploadEvent>,
    workers: Arc<Mutex<HashMap<ItemId, Worker>>>,
) {
    let item_id = spec.item_id;
    let _ = events.send(UploadEvent::Started { item_id });

    let outcome = drive_upload(transport.as_ref(), &spec, &cancel, &events).await;
    match outcome {
        Outcome::Completed(attachment) => {
            info!(item = %item_id, upload = %spec.upload_id, "upload complete");
            let _ = events.send(UploadEvent::Completed {
                item_id,
                attachment,
            });
        }
        Outcome::Failed(message) => {
            let _ = events.send(UploadEvent::Failed {
                item_id,
                error: message,
            });
        }
        Outcome::Cancelled => {
            info!(item = %item_id, upload = %spec.upload_id, "upload cancelled");
            let _ = events.send(UploadEvent::Cancelled { item_id });
        }
    }

    if let Ok(mut workers) = workers.lock() {
        workers.remove(&item_id);
    }
}

enum Outcome {
    Completed(MessageAttachment),
    Failed(String),
    Cancelled,
}

async fn drive_upload(
    transport: &dyn ChunkTransport,
    spec: &UploadSpec,
    cancel: &CancelSignal,
    events: &mpsc::UnboundedSender<UploadEvent>,
) -> Outcome {
    let total_bytes = spec.data.len() as u64;
    let chunk_size = (spec.chunk_size_bytes.max(1)) as usize;
    let total_chunks = spec.data.len().div_ceil(chunk_size) as u32;

    let mut uploaded: u64 = 0;
    for index in 0..total_chunks {
        // Never start the next chunk once cancelled.
        if cancel.is_cancelled() {
            return cancel_session(transport, spec).await;
        }

        let start = index as usize * chunk_size;
        let end = (start + chunk_size).min(spec.data.len());
        let slice = spec.data.slice(start..end);

        let progress = progress_sink(spec, uploaded, total_bytes, events.clone());
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // The in-flight chunk request is dropped here.
                return cancel_session(transport, spec).await;
            }
            result = transport.upload_chunk(
                &spec.upload_id,
                index,
                total_chunks,
                &spec.file_name,
                slice,
                Some(progress),
            ) => result,
        };

        match result {
            Ok(_ack) => {
                uploaded += (end - start) as u64;
                let percent = aggregate_percent(uploaded, 0, total_bytes);
                let _ = events.send(UploadEvent::Progress {
                    item_id: spec.item_id,
                    attachment_id: spec.attachment_id,
                    percent,
                });
            }
            Err(e) => {
                error!(
                    item = %spec.item_id,
                    upload = %spec.upload_id,
                    chunk = index,
                    error = %e,
                    "chunk upload failed"
                );
                return Outcome::Failed(UPLOAD_FAILED_MESSAGE.to_string());
            }
        }
    }

    if cancel.is_cancelled() {
        return cancel_session(transport, spec).await;
    }

    let _ = events.send(UploadEvent::Finalizing {
        item_id: spec.item_id,
    });
    match transport.finalize(&spec.upload_id).await {
        Ok(attachment) => Outcome::Completed(attachment),
        Err(e) => {
            error!(
                item = %spec.item_id,
                upload = %spec.upload_id,
                error = %e,
                "finalize failed"
            );
            Outcome::Failed(UPLOAD_FAILED_MESSAGE.to_string())
        }
    }
}

/// Best-effort server-side session invalidation after a local cancel.
/// A failed cancel call surfaces as a FAILED item rather than a silently
/// vanished draft.
async fn cancel_session(transport: &dyn ChunkTransport, spec: &UploadSpec) -> Outcome {
    match transport.cancel(&spec.upload_id).await {
        Ok(()) => Outcome::Cancelled,
        Err(e) => {
            warn!(
                item = %spec.item_id,
                upload = %spec.upload_id,
                error = %e,
                "cancel request failed"
            );
            Outcome::Failed(UPLOAD_CANCELLED_MESSAGE.to_string())
        }
    }
}

fn progress_sink(
    spec: &UploadSpec,
    uploaded: u64,
    total_bytes: u64,
    events: mpsc::UnboundedSender<UploadEvent>,
) -> ProgressFn {
    let item_id = spec.item_id;
    let attachment_id = spec.attachment_id;
    Arc::new(move |loaded| {
        let percent = aggregate_percent(uploaded, loaded, total_bytes);
        let _ = events.send(UploadEvent::Progress {
            item_id,
            attachment_id,
            percent,
        });
    })
}

/// `round((done + current) / total * 100)`, clamped to 100.
fn aggregate_percent(uploaded: u64, current_loaded: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 100;
    }
    let ratio = (uploaded + current_loaded) as f64 / total_bytes as f64;
    ((ratio * 100.0).round() as u64).min(100) as u8
}
