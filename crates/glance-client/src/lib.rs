//! # glance-client
//!
//! The messaging orchestrator: wires the REST gateway, the realtime
//! transports, the upload engine, and the in-memory store behind one
//! controller that a UI binds to.
//!
//! Typical wiring:
//!
//! ```no_run
//! # async fn wiring() {
//! use std::sync::Arc;
//! use glance_client::{ClientConfig, MessengerController};
//! use glance_media::UploadEngine;
//! use glance_net::{MessageApi, MessageTransport};
//! use glance_shared::StaticSession;
//!
//! let config = ClientConfig::default();
//! let auth = Arc::new(StaticSession::new("token", "alice"));
//! let api = Arc::new(MessageApi::new(auth.clone(), &config.api_base_url));
//! let transport = Arc::new(MessageTransport::new(auth.clone(), &config.transport_options()));
//! let (engine, upload_events) = UploadEngine::new(api.clone());
//!
//! let (controller, _ui_events) =
//!     MessengerController::new(auth, api, transport.clone(), engine);
//! let controller = Arc::new(tokio::sync::Mutex::new(controller));
//!
//! transport.connect().await;
//! controller.lock().await.init().await;
//! tokio::spawn(glance_client::run_event_loop(
//!     controller,
//!     transport.events(),
//!     upload_events,
//! ));
//! # }
//! ```

pub mod composer;
pub mod config;
pub mod controller;
pub mod events;
pub mod format;
pub mod gateway;
pub mod typing;

pub use config::ClientConfig;
pub use controller::{run_event_loop, MessengerController};
pub use events::{UiEmitter, UiEvent};
pub use gateway::{MessageGateway, TypingPublisher};

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise structured logging for an embedding application.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("glance_client=debug,glance_net=debug,glance_media=info,glance_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
