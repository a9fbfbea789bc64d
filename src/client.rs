//! Messaging client abstraction
//!
//! The protocol, pairing and session handling live behind [`MessagingClient`].
//! The relay and the sender only ever hold an `Arc<dyn MessagingClient>`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::types::{InboundEvent, Jid, PairingEvent, SendReceipt};

/// Receives every event the client produces
///
/// Handlers are called from the client's dispatch task and must not block.
/// The event is only borrowed for the duration of the call.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &InboundEvent);
}

/// Connection to the messaging network
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Open the connection (using the stored identity if the device is paired)
    async fn connect(&self) -> Result<(), ClientError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Start the QR pairing flow. Must be called before `connect` on an unpaired device.
    async fn pairing_channel(&self) -> Result<mpsc::Receiver<PairingEvent>, ClientError>;

    /// Produce a fresh message id
    fn generate_message_id(&self) -> String;

    /// Send a plain text message
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, ClientError>;

    /// Register a handler for inbound events
    fn add_event_handler(&self, handler: Arc<dyn EventHandler>);
}
