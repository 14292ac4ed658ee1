use thiserror::Error;

/// Errors produced by the network layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// Transport-level HTTP failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed STOMP frame.
    #[error("STOMP frame error: {0}")]
    Stomp(String),

    /// JSON payload failed to decode.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid endpoint URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Credentials could not be encoded into a header.
    #[error("Invalid auth header")]
    InvalidAuthHeader,
}
