// Network layer: REST client plus STOMP-over-WebSocket realtime transports.

pub mod decode;
pub mod error;
pub mod messages;
pub mod realtime;
pub mod rest;
pub mod stomp;

pub use decode::{decode_frame, RealtimeEvent};
pub use error::NetError;
pub use messages::{MessageTransport, NotificationTransport, TransportOptions};
pub use realtime::{RealtimeClient, RealtimeConfig};
pub use rest::{MessageApi, ProgressFn};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
