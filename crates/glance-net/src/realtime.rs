//! Realtime transport: one persistent STOMP-over-WebSocket connection per
//! concern, driven by a background tokio task.
//!
//! External code talks to the task through a command channel and receives
//! decoded events on a broadcast channel (replay-free: subscribers only see
//! events published after they subscribe). Connection failures are logged and
//! healed by an automatic reconnect with a fixed delay; they are never
//! surfaced to callers as typed errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use glance_shared::constants::{HEARTBEAT_INTERVAL_MS, RECONNECT_DELAY_MS};
use glance_shared::AuthSession;

use crate::decode::{decode_frame, RealtimeEvent};
use crate::error::NetError;
use crate::stomp::{self, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for one realtime connection.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:8080/ws`.
    pub ws_url: String,
    /// Destinations subscribed right after the broker confirms the session.
    pub subscriptions: Vec<String>,
    pub reconnect_delay: Duration,
    pub heartbeat: Duration,
}

impl RealtimeConfig {
    pub fn new(ws_url: impl Into<String>, subscriptions: Vec<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            subscriptions,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            heartbeat: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
        }
    }
}

#[derive(Debug)]
enum TransportCommand {
    Publish { destination: String, body: String },
    Shutdown,
}

struct Connection {
    cmd_tx: mpsc::Sender<TransportCommand>,
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Owns at most one live connection. `connect`/`disconnect` are the only
/// writers of the handle.
pub struct RealtimeClient {
    auth: Arc<dyn AuthSession>,
    config: RealtimeConfig,
    events: broadcast::Sender<RealtimeEvent>,
    connection: Mutex<Option<Connection>>,
}

impl RealtimeClient {
    pub fn new(auth: Arc<dyn AuthSession>, config: RealtimeConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            auth,
            config,
            events,
            connection: Mutex::new(None),
        }
    }

    /// Subscribe to decoded broker events. New subscribers only see events
    /// published after this call.
    pub fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.lock_connection()
            .as_ref()
            .is_some_and(|connection| connection.active.load(Ordering::SeqCst))
    }

    /// Open the connection. No-op when already active; silently does nothing
    /// when no auth token is available.
    ///
    /// The first dial happens inline, so a concurrent `connect` may win the
    /// race while this one awaits; in that case the freshly dialed socket is
    /// abandoned instead of installing a duplicate connection.
    pub async fn connect(&self) {
        if self.is_active() {
            return;
        }
        let Some(token) = self.auth.token() else {
            debug!("no auth token, skipping realtime connect");
            return;
        };
        let url = match socket_url(&self.config.ws_url, &token) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, url = %self.config.ws_url, "invalid realtime endpoint");
                return;
            }
        };

        let initial = match dial(&url, &token).await {
            Ok(socket) => Some(socket),
            Err(e) => {
                // The reconnect loop inside the task retries with a delay.
                error!(error = %e, "initial realtime dial failed");
                None
            }
        };

        let mut guard = self.lock_connection();
        if guard
            .as_ref()
            .is_some_and(|connection| connection.active.load(Ordering::SeqCst))
        {
            debug!("realtime connection became active during dial, abandoning activation");
            return;
        }

        let active = Arc::new(AtomicBool::new(true));
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let session = SessionParams {
            url,
            token,
            subscriptions: self.config.subscriptions.clone(),
            reconnect_delay: self.config.reconnect_delay,
            heartbeat: self.config.heartbeat,
        };
        let task = tokio::spawn(run_connection(
            initial,
            session,
            self.events.clone(),
            Arc::clone(&active),
            cmd_rx,
        ));
        *guard = Some(Connection {
            cmd_tx,
            active,
            task,
        });
    }

    /// Tear the connection down and release the handle. Safe to call with no
    /// active connection.
    pub async fn disconnect(&self) {
        let connection = self.lock_connection().take();
        if let Some(connection) = connection {
            connection.active.store(false, Ordering::SeqCst);
            if connection
                .cmd_tx
                .send(TransportCommand::Shutdown)
                .await
                .is_err()
            {
                connection.task.abort();
            }
        }
    }

    /// Publish a SEND frame. Dropped with a log line when not connected.
    pub async fn publish(&self, destination: &str, body: String) {
        let cmd_tx = self
            .lock_connection()
            .as_ref()
            .map(|connection| connection.cmd_tx.clone());
        match cmd_tx {
            Some(cmd_tx) => {
                if cmd_tx
                    .send(TransportCommand::Publish {
                        destination: destination.to_string(),
                        body,
                    })
                    .await
                    .is_err()
                {
                    warn!(destination = %destination, "publish dropped, realtime task gone");
                }
            }
            None => debug!(destination = %destination, "publish dropped, realtime not connected"),
        }
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct SessionParams {
    url: Url,
    token: String,
    subscriptions: Vec<String>,
    reconnect_delay: Duration,
    heartbeat: Duration,
}

/// Token is dual-carried: Authorization header plus `token` query parameter,
/// for transports that strip custom headers along the way.
fn socket_url(base: &str, token: &str) -> Result<Url, NetError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

async fn dial(url: &Url, token: &str) -> Result<WsStream, NetError> {
    let mut request = url.as_str().into_client_request()?;
    let bearer =
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| NetError::InvalidAuthHeader)?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    let (socket, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(socket)
}

enum SessionEnd {
    Shutdown,
    ConnectionLost,
}

async fn run_connection(
    initial: Option<WsStream>,
    session: SessionParams,
    events: broadcast::Sender<RealtimeEvent>,
    active: Arc<AtomicBool>,
    mut cmd_rx: mpsc::Receiver<TransportCommand>,
) {
    let mut pending = initial;
    loop {
        let socket = match pending.take() {
            Some(socket) => socket,
            None => match dial(&session.url, &session.token).await {
                Ok(socket) => socket,
                Err(e) => {
                    error!(error = %e, "realtime dial failed");
                    if pause_for_reconnect(session.reconnect_delay, &mut cmd_rx).await {
                        break;
                    }
                    continue;
                }
            },
        };

        match drive_session(socket, &session, &events, &mut cmd_rx).await {
            SessionEnd::Shutdown => break,
            SessionEnd::ConnectionLost => {
                warn!(
                    delay_ms = session.reconnect_delay.as_millis() as u64,
                    "realtime connection lost, reconnecting"
                );
                if pause_for_reconnect(session.reconnect_delay, &mut cmd_rx).await {
                    break;
                }
            }
        }
    }
    active.store(false, Ordering::SeqCst);
    info!("realtime connection closed");
}

/// Sleep out the reconnect delay while staying responsive to shutdown.
/// Returns `true` when the task should stop.
async fn pause_for_reconnect(
    delay: Duration,
    cmd_rx: &mut mpsc::Receiver<TransportCommand>,
) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return false,
            cmd = cmd_rx.recv() => match cmd {
                None | Some(TransportCommand::Shutdown) => return true,
                Some(TransportCommand::Publish { destination, .. }) => {
                    debug!(destination = %destination, "publish dropped while reconnecting");
                }
            }
        }
    }
}

async fn drive_session(
    mut socket: WsStream,
    session: &SessionParams,
    events: &broadcast::Sender<RealtimeEvent>,
    cmd_rx: &mut mpsc::Receiver<TransportCommand>,
) -> SessionEnd {
    let connect = Frame::connect(&session.token, session.heartbeat.as_millis() as u64);
    if let Err(e) = socket.send(WsMessage::Text(connect.encode())).await {
        error!(error = %e, "failed to send CONNECT frame");
        return SessionEnd::ConnectionLost;
    }

    // Wait for CONNECTED before subscribing.
    loop {
        match socket.next().await {
            Some(Ok(WsMessage::Text(text))) => match Frame::parse(&text) {
                Ok(Some(frame)) if frame.command == stomp::CMD_CONNECTED => break,
                Ok(Some(frame)) if frame.command == stomp::CMD_ERROR => {
                    error!(
                        message = frame.header_value("message").unwrap_or(""),
                        "broker rejected connection"
                    );
                    return SessionEnd::ConnectionLost;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "dropping malformed frame during handshake"),
            },
            Some(Ok(WsMessage::Ping(payload))) => {
                if socket.send(WsMessage::Pong(payload)).await.is_err() {
                    return SessionEnd::ConnectionLost;
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::ConnectionLost,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(error = %e, "realtime socket error during handshake");
                return SessionEnd::ConnectionLost;
            }
        }
    }

    for (index, destination) in session.subscriptions.iter().enumerate() {
        let frame = Frame::subscribe(&format!("sub-{index}"), destination);
        if let Err(e) = socket.send(WsMessage::Text(frame.encode())).await {
            error!(error = %e, destination = %destination, "subscribe failed");
            return SessionEnd::ConnectionLost;
        }
    }
    info!(
        subscriptions = session.subscriptions.len(),
        "realtime connected"
    );

    let mut heartbeat = tokio::time::interval(session.heartbeat);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    heartbeat.reset();

    loop {
        tokio::select! {
            incoming = socket.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if handle_text_frame(&text, events) {
                        return SessionEnd::ConnectionLost;
                    }
                }
                Some(Ok(WsMessage::Ping(payload))) => {
                    if socket.send(WsMessage::Pong(payload)).await.is_err() {
                        return SessionEnd::ConnectionLost;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::ConnectionLost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "realtime socket error");
                    return SessionEnd::ConnectionLost;
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCommand::Publish { destination, body }) => {
                    let frame = Frame::send(&destination, body);
                    if let Err(e) = socket.send(WsMessage::Text(frame.encode())).await {
                        error!(error = %e, destination = %destination, "publish failed");
                        return SessionEnd::ConnectionLost;
                    }
                }
                Some(TransportCommand::Shutdown) | None => {
                    let _ = socket.close(None).await;
                    return SessionEnd::Shutdown;
                }
            },
            _ = heartbeat.tick() => {
                if socket.send(WsMessage::Text(stomp::HEARTBEAT.into())).await.is_err() {
                    return SessionEnd::ConnectionLost;
                }
            }
        }
    }
}

/// Returns `true` when the session must be abandoned (broker ERROR frame).
/// Malformed frames are logged and dropped without touching the connection.
fn handle_text_frame(text: &str, events: &broadcast::Sender<RealtimeEvent>) -> bool {
    match Frame::parse(text) {
        Ok(None) => false, // heartbeat
        Ok(Some(frame)) if frame.command == stomp::CMD_MESSAGE => {
            let Some(destination) = frame.header_value("destination") else {
                warn!("MESSAGE frame without destination dropped");
                return false;
            };
            if let Some(event) = decode_frame(destination, &frame.body) {
                // Send only fails when nobody is subscribed; that is fine.
                let _ = events.send(event);
            }
            false
        }
        Ok(Some(frame)) if frame.command == stomp::CMD_ERROR => {
            error!(
                message = frame.header_value("message").unwrap_or(""),
                "broker error frame"
            );
            true
        }
        Ok(Some(frame)) => {
            debug!(command = %frame.command, "unhandled frame dropped");
            false
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed realtime frame");
            false
        }
    }
}
