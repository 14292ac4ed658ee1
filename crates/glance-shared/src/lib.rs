//! # glance-shared
//!
//! Wire and domain types shared by every Glance crate: conversations,
//! messages, attachments, upload-session DTOs, protocol constants, and the
//! opaque auth-session capability the engine consumes.

pub mod auth;
pub mod constants;
pub mod types;

pub use auth::{AuthSession, StaticSession};
pub use types::*;
