//! # glance-media
//!
//! The attachment pipeline: selection-time validation, image/video
//! pre-processing, and the chunked upload engine with per-item workers and
//! cooperative cancellation.

pub mod compress;
pub mod item;
pub mod kind;
pub mod transport;
pub mod upload;
pub mod validate;
pub mod video;

pub use item::{AttachmentItem, ItemStatus};
pub use transport::{ChunkTransport, ProgressFn};
pub use upload::{CancelSignal, UploadEngine, UploadEvent};
pub use validate::{validate_selection, BatchOutcome, ValidatedFile};
