//! Minimal STOMP framing for the backend's message broker.
//!
//! The broker speaks STOMP over a WebSocket: one text frame per STOMP frame,
//! NUL-terminated, with a bare newline serving as a heartbeat in either
//! direction. Only the handful of commands the messaging protocol uses are
//! modeled.

use crate::error::NetError;

/// Heartbeat frame, sent and received as a lone newline.
pub const HEARTBEAT: &str = "\n";

pub const CMD_CONNECT: &str = "CONNECT";
pub const CMD_CONNECTED: &str = "CONNECTED";
pub const CMD_SUBSCRIBE: &str = "SUBSCRIBE";
pub const CMD_SEND: &str = "SEND";
pub const CMD_MESSAGE: &str = "MESSAGE";
pub const CMD_ERROR: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// CONNECT frame carrying the bearer token and the heartbeat contract.
    pub fn connect(token: &str, heartbeat_ms: u64) -> Self {
        Frame::new(CMD_CONNECT)
            .header("accept-version", "1.2")
            .header("heart-beat", &format!("{heartbeat_ms},{heartbeat_ms}"))
            .header("Authorization", &format!("Bearer {token}"))
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(CMD_SUBSCRIBE)
            .header("id", id)
            .header("destination", destination)
    }

    pub fn send(destination: &str, body: String) -> Self {
        Frame::new(CMD_SEND)
            .header("destination", destination)
            .header("content-type", "application/json")
            .with_body(body)
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one inbound frame. `Ok(None)` is a heartbeat.
    pub fn parse(raw: &str) -> Result<Option<Frame>, NetError> {
        let trimmed = raw.trim_matches(['\n', '\r']);
        if trimmed.is_empty() {
            return Ok(None);
        }

        let raw = raw.trim_end_matches('\0');
        let (head, body) = match raw.split_once("\n\n") {
            Some((head, body)) => (head, body),
            None => (raw, ""),
        };

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| NetError::Stomp("frame missing command".into()))?;

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| NetError::Stomp(format!("malformed header line: {line}")))?;
            headers.push((name.to_string(), value.to_string()));
        }

        Ok(Some(Frame {
            command: command.to_string(),
            headers,
            body: body.trim_end_matches('\0').to_string(),
        }))
    }
}
