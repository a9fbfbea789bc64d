//! Outbound message sending

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::client::MessagingClient;
use crate::error::SendError;
use crate::types::Jid;

/// Upper bound on a single send
pub const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends text messages through the shared messaging client
#[derive(Clone)]
pub struct MessageSender {
    client: Arc<dyn MessagingClient>,
    send_timeout: Duration,
}

impl MessageSender {
    pub fn new(client: Arc<dyn MessagingClient>) -> Self {
        Self {
            client,
            send_timeout: SEND_TIMEOUT,
        }
    }

    /// Override the send timeout
    pub fn with_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Send `text` to `recipient` (a bare user id) and return the network's message id
    pub async fn send(&self, recipient: &str, text: &str) -> Result<String, SendError> {
        let target = Jid::user(recipient);
        // The network may assign its own id, so the receipt id is what we report.
        let local_id = self.client.generate_message_id();
        debug!("Sending message {} to {}", local_id, target);

        match timeout(self.send_timeout, self.client.send_text(&target, text)).await {
            Ok(Ok(receipt)) => {
                info!("Message sent, ID: {}", receipt.id);
                Ok(receipt.id)
            }
            Ok(Err(e)) => {
                error!("Failed to send message: {}", e);
                Err(SendError::Transport(e))
            }
            Err(_) => {
                error!(
                    "Failed to send message: timed out after {}s",
                    self.send_timeout.as_secs()
                );
                Err(SendError::Timeout(self.send_timeout))
            }
        }
    }
}
