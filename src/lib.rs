//! WhatsApp Relay Library
//!
//! Links to WhatsApp through a multi-device gateway, logs inbound events and
//! exposes a single HTTP endpoint for sending text messages.
//!
//! # Architecture
//!
//! ```text
//! HTTP client ──POST /send──▶ Relay (this) ──HTTP──▶ Gateway ──▶ WhatsApp
//!                               │
//!                               ├── HTTP API (port 8080)
//!                               ├── Event Relay (gateway events → log lines)
//!                               └── Device Store (SQLite)
//! ```
//!
//! # Usage
//!
//! ```bash
//! export GATEWAY_URL=http://127.0.0.1:3000
//! whatsapp-relay
//!
//! curl -X POST localhost:8080/send \
//!     -H 'content-type: application/json' \
//!     -d '{"jid": "15551234567", "text": "hi"}'
//! ```
//!
//! On first start the device is unpaired and a QR code is printed to the
//! terminal; scan it from the phone's "Linked devices" screen.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pairing;
pub mod relay;
pub mod sender;
pub mod storage;
pub mod types;

pub use client::{EventHandler, MessagingClient};
pub use config::RelayConfig;
pub use error::{ApiError, ClientError, SendError};
pub use gateway::GatewayClient;
pub use relay::EventRelay;
pub use sender::MessageSender;
pub use storage::{Device, DeviceStore};
pub use types::*;

/// Prelude for common imports
pub mod prelude {
    pub use crate::client::{EventHandler, MessagingClient};
    pub use crate::config::RelayConfig;
    pub use crate::relay::EventRelay;
    pub use crate::sender::MessageSender;
    pub use crate::types::*;
}
