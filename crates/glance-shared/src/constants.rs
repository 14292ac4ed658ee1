/// Maximum message content length in characters
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Conversation preview truncation limit in characters
pub const PREVIEW_LIMIT: usize = 120;

/// Maximum number of attachments per composed message
pub const MAX_ATTACHMENTS_PER_MESSAGE: usize = 6;

/// Per-type attachment size ceilings in bytes
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Minimum interval between two outbound `typing=true` signals (ms)
pub const TYPING_RESEND_INTERVAL_MS: u64 = 800;

/// Composer inactivity window before an automatic `typing=false` (ms)
pub const TYPING_IDLE_TIMEOUT_MS: u64 = 1500;

/// How long an inbound typing indicator stays visible without a refresh (ms)
pub const TYPING_DISPLAY_TTL_MS: u64 = 3000;

/// Fixed realtime reconnect delay (ms)
pub const RECONNECT_DELAY_MS: u64 = 5000;

/// STOMP heartbeat interval, both directions (ms)
pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// How long a completed attachment stays visible before leaving the draft list (ms)
pub const COMPLETED_ITEM_GRACE_MS: u64 = 1500;

/// Longest edge an image is downscaled to before upload
pub const MAX_IMAGE_DIMENSION: u32 = 1920;

/// JPEG quality factor for re-encoded images
pub const IMAGE_ENCODE_QUALITY: u8 = 85;

/// Realtime topics
pub const TOPIC_MESSAGES: &str = "/user/queue/messages";
pub const TOPIC_TYPING: &str = "/user/queue/typing";
pub const TOPIC_NOTIFICATION_COUNT: &str = "/user/queue/notification-count";
pub const DESTINATION_TYPING: &str = "/app/messages/typing";

/// Default backend endpoints (fixed at build time, overridable in tests)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// REST base path for the messaging API
pub const MESSAGES_API_PATH: &str = "/api/messages";
