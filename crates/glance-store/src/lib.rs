//! # glance-store
//!
//! In-memory state for the messaging view: the conversation list and the
//! active message list, kept consistent across REST snapshots and realtime
//! deltas. REST responses are the source of truth; nothing here persists.

pub mod preview;
pub mod store;

pub use preview::build_preview;
pub use store::{ConversationStore, PreviewOutcome};
