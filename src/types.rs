//! Message and event types shared by the relay, the sender and the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server suffix for regular user accounts
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";

// =============================================================================
// Addressing
// =============================================================================

/// WhatsApp address (`user@server`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    user: String,
    server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// Build a recipient on the default user server
    pub fn user(user: impl Into<String>) -> Self {
        Self::new(user, DEFAULT_USER_SERVER)
    }

    /// Parse `user@server`. A string without `@` is a server-only address.
    pub fn parse(value: &str) -> Self {
        match value.split_once('@') {
            Some((user, server)) => Self::new(user, server),
            None => Self::new("", value),
        }
    }

    pub fn user_part(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Body of an incoming chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Plain conversation text
    PlainText(String),
    /// Extended text message (links, quotes, mentions)
    ExtendedText(String),
    /// Media, reactions, protocol messages and anything else
    Unrecognized,
}

/// Incoming chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub sender: Jid,
    pub body: MessageBody,
}

/// Event emitted by the messaging client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(MessageEvent),
    Connected,
    OfflineSyncCompleted,
    LoggedOut,
    Disconnected,
    /// Any event kind the relay has no handling for
    Unknown(String),
}

impl InboundEvent {
    /// Event kind name as reported in logs
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::Message(_) => "message",
            InboundEvent::Connected => "connected",
            InboundEvent::OfflineSyncCompleted => "offline_sync_completed",
            InboundEvent::LoggedOut => "logged_out",
            InboundEvent::Disconnected => "disconnected",
            InboundEvent::Unknown(kind) => kind,
        }
    }
}

/// Progress of the QR pairing flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// New code to render for scanning
    Code(String),
    /// Device linked; identity assigned by the network
    Success { jid: Jid, token: String },
    /// No scan happened before the codes ran out
    Timeout,
    /// Pairing failed with the given reason
    Error(String),
}

impl PairingEvent {
    /// Whether the flow ends after this event
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PairingEvent::Code(_))
    }
}

/// Acknowledgement of an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Message id assigned by the network
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// HTTP Payloads
// =============================================================================

/// `POST /send` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub jid: String,
    #[serde(default)]
    pub text: String,
}

/// Successful `POST /send` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Error payload returned on every failure path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jid_user_display() {
        let jid = Jid::user("15551234567");
        assert_eq!(jid.to_string(), "15551234567@s.whatsapp.net");
        assert_eq!(jid.user_part(), "15551234567");
        assert_eq!(jid.server(), DEFAULT_USER_SERVER);
    }

    #[test]
    fn test_jid_parse() {
        let jid = Jid::parse("1234@server");
        assert_eq!(jid.user_part(), "1234");
        assert_eq!(jid.server(), "server");
        assert_eq!(jid.to_string(), "1234@server");

        let server_only = Jid::parse("status");
        assert_eq!(server_only.user_part(), "");
        assert_eq!(server_only.to_string(), "status");
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(InboundEvent::Connected.kind(), "connected");
        assert_eq!(
            InboundEvent::Unknown("receipt".to_string()).kind(),
            "receipt"
        );
    }

    #[test]
    fn test_pairing_terminal() {
        assert!(!PairingEvent::Code("2@abc".to_string()).is_terminal());
        assert!(PairingEvent::Timeout.is_terminal());
        assert!(PairingEvent::Error("err-client-outdated".to_string()).is_terminal());
    }

    #[test]
    fn test_send_request_missing_fields_default_empty() {
        let req: SendRequest = serde_json::from_str(r#"{"jid":"123"}"#).unwrap();
        assert_eq!(req.jid, "123");
        assert!(req.text.is_empty());
    }
}
