//! Multi-device gateway client
//!
//! Implements [`MessagingClient`] on top of a gateway sidecar that owns the
//! WhatsApp protocol and exposes it over HTTP:
//! - Session connect/disconnect with the stored device token
//! - QR pairing status polling
//! - Cursor-based long polling of inbound events
//! - Text message sending

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::{EventHandler, MessagingClient};
use crate::config::RelayConfig;
use crate::error::ClientError;
use crate::storage::Device;
use crate::types::{InboundEvent, Jid, MessageBody, MessageEvent, PairingEvent, SendReceipt};

/// Backoff after a failed event poll
const EVENT_RETRY_DELAY: Duration = Duration::from_secs(5);

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    jid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    event: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    jid: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    to: String,
    id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    id: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: String,
}

/// Incoming message as reported by the gateway
#[derive(Debug, Deserialize)]
struct WireMessage {
    sender: String,
    #[serde(default)]
    conversation: Option<String>,
    #[serde(default)]
    extended_text: Option<String>,
}

impl WireMessage {
    fn into_event(self) -> MessageEvent {
        let body = match (self.conversation, self.extended_text) {
            (Some(text), _) if !text.is_empty() => MessageBody::PlainText(text),
            (_, Some(text)) => MessageBody::ExtendedText(text),
            _ => MessageBody::Unrecognized,
        };
        MessageEvent {
            sender: Jid::parse(&self.sender),
            body,
        }
    }
}

/// Map a raw gateway event to an [`InboundEvent`]
pub fn parse_event(raw: &Value) -> InboundEvent {
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match kind {
        "message" => match WireMessage::deserialize(raw) {
            Ok(message) => InboundEvent::Message(message.into_event()),
            Err(e) => {
                warn!("Malformed message event from gateway: {}", e);
                InboundEvent::Unknown(kind.to_string())
            }
        },
        "connected" => InboundEvent::Connected,
        "offline_sync_completed" => InboundEvent::OfflineSyncCompleted,
        "logged_out" => InboundEvent::LoggedOut,
        "disconnected" => InboundEvent::Disconnected,
        other => InboundEvent::Unknown(other.to_string()),
    }
}

/// Map a pairing status response to a [`PairingEvent`]. Returns `None` for
/// non-terminal states that carry no new code.
fn parse_pairing(resp: PairResponse) -> Option<PairingEvent> {
    match resp.event.as_str() {
        "code" => resp.code.map(PairingEvent::Code),
        "success" => match (resp.jid, resp.token) {
            (Some(jid), Some(token)) => Some(PairingEvent::Success {
                jid: Jid::parse(&jid),
                token,
            }),
            _ => Some(PairingEvent::Error(
                "success without device identity".to_string(),
            )),
        },
        "timeout" => Some(PairingEvent::Timeout),
        "pending" => None,
        other => Some(PairingEvent::Error(other.to_string())),
    }
}

/// Generate an id in the `3EB0` + hex form the network uses
pub fn new_message_id() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("3EB0{}", &hex[..16])
}

// =============================================================================
// Gateway Client
// =============================================================================

/// Session credentials presented to the gateway
#[derive(Debug, Clone, Default)]
struct Session {
    jid: Option<String>,
    token: Option<String>,
}

/// Shared state between the client handle and its background tasks
struct Inner {
    config: RelayConfig,
    http: Client,
    session: RwLock<Session>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    connected: AtomicBool,
}

/// [`MessagingClient`] backed by the gateway HTTP API
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
    event_task: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl GatewayClient {
    /// Create a client for `device`
    pub fn new(config: RelayConfig, device: &Device) -> Result<Self, ClientError> {
        // Long polls must outlive the poll window
        let http = Client::builder()
            .timeout(Duration::from_secs(config.event_poll_wait_secs.saturating_add(30)))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                session: RwLock::new(Session {
                    jid: device.jid.clone(),
                    token: device.token.clone(),
                }),
                handlers: RwLock::new(Vec::new()),
                connected: AtomicBool::new(false),
            }),
            event_task: Arc::new(RwLock::new(None)),
        })
    }

    /// Whether `connect` has succeeded and no disconnect happened since
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Start dispatching gateway events to registered handlers
    pub fn start_event_loop(&self) {
        let mut guard = self.event_task.write();
        if guard.is_some() {
            return;
        }

        let inner = self.inner.clone();
        *guard = Some(tokio::spawn(async move {
            inner.run_event_loop().await;
        }));
        debug!("Gateway event loop started");
    }

    fn stop_event_loop(&self) {
        if let Some(task) = self.event_task.write().take() {
            task.abort();
            debug!("Gateway event loop stopped");
        }
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.gateway_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.config.gateway_api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        };
        match &self.session.read().token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode the JSON body, mapping error statuses
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if self.config.debug_mode {
            debug!("Gateway response {}: {}", status, body);
        }

        if !status.is_success() {
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(ClientError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::Other(format!("Invalid gateway response: {}", e)))
    }

    async fn poll_events(&self, cursor: Option<&str>) -> Result<EventsResponse, ClientError> {
        let mut query = vec![("wait", self.config.event_poll_wait_secs.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        self.call(self.http.get(self.url("/events")).query(&query))
            .await
    }

    fn dispatch(&self, event: &InboundEvent) {
        debug!("Dispatching {} event", event.kind());
        match event {
            InboundEvent::Connected => self.connected.store(true, Ordering::SeqCst),
            InboundEvent::Disconnected | InboundEvent::LoggedOut => {
                self.connected.store(false, Ordering::SeqCst)
            }
            _ => {}
        }

        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.handle_event(event);
        }
    }

    async fn run_event_loop(&self) {
        let mut cursor: Option<String> = None;

        loop {
            match self.poll_events(cursor.as_deref()).await {
                Ok(batch) => {
                    debug!("Received {} events from gateway", batch.events.len());
                    for raw in &batch.events {
                        self.dispatch(&parse_event(raw));
                    }
                    if batch.next_cursor.is_some() {
                        cursor = batch.next_cursor;
                    }
                }
                Err(e) => {
                    warn!(
                        "Event poll failed: {}, retrying in {}s",
                        e,
                        EVENT_RETRY_DELAY.as_secs()
                    );
                    tokio::time::sleep(EVENT_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn run_pairing(self: Arc<Self>, tx: mpsc::Sender<PairingEvent>) {
        let interval = Duration::from_millis(self.config.pairing_poll_interval_ms);
        let mut last_code: Option<String> = None;

        loop {
            let response: Result<PairResponse, ClientError> =
                self.call(self.http.get(self.url("/session/pair"))).await;

            let event = match response {
                Ok(resp) => parse_pairing(resp),
                Err(e) if e.is_transient() => {
                    warn!("Pairing status poll failed: {}, retrying", e);
                    None
                }
                Err(e) => Some(PairingEvent::Error(e.to_string())),
            };

            match event {
                Some(PairingEvent::Code(code)) if last_code.as_ref() == Some(&code) => {}
                Some(event) => {
                    if let PairingEvent::Code(code) = &event {
                        last_code = Some(code.clone());
                    }
                    if let PairingEvent::Success { jid, token } = &event {
                        let mut session = self.session.write();
                        session.jid = Some(jid.to_string());
                        session.token = Some(token.clone());
                    }
                    let terminal = event.is_terminal();
                    if tx.send(event).await.is_err() || terminal {
                        return;
                    }
                }
                None => {}
            }

            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl MessagingClient for GatewayClient {
    async fn connect(&self) -> Result<(), ClientError> {
        let session = self.inner.session.read().clone();
        info!(
            "Connecting to gateway at {} (device: {})",
            self.inner.config.gateway_url,
            session.jid.as_deref().unwrap_or("unpaired")
        );

        let body = ConnectRequest {
            jid: session.jid.as_deref(),
            token: session.token.as_deref(),
        };
        let resp: ConnectResponse = self
            .inner
            .call(
                self.inner
                    .http
                    .post(self.inner.url("/session/connect"))
                    .json(&body),
            )
            .await?;

        if !resp.connected && session.jid.is_some() {
            return Err(ClientError::NotConnected);
        }

        self.inner.connected.store(resp.connected, Ordering::SeqCst);
        self.start_event_loop();
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.stop_event_loop();
        let result: Result<Value, ClientError> = self
            .inner
            .call(self.inner.http.post(self.inner.url("/session/disconnect")))
            .await;
        self.inner.connected.store(false, Ordering::SeqCst);
        result.map(|_| ())
    }

    async fn pairing_channel(&self) -> Result<mpsc::Receiver<PairingEvent>, ClientError> {
        if self.inner.session.read().jid.is_some() {
            return Err(ClientError::Other(
                "pairing channel requested for a paired device".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(8);
        let inner = self.inner.clone();
        tokio::spawn(inner.run_pairing(tx));
        Ok(rx)
    }

    fn generate_message_id(&self) -> String {
        new_message_id()
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, ClientError> {
        if self.inner.session.read().token.is_none() {
            return Err(ClientError::NotPaired);
        }

        let id = new_message_id();
        let body = SendMessageRequest {
            to: to.to_string(),
            id: &id,
            text,
        };

        debug!("Sending message {} to {} via gateway", id, to);

        let resp: SendMessageResponse = self
            .inner
            .call(self.inner.http.post(self.inner.url("/messages")).json(&body))
            .await
            .inspect_err(|e| error!("Gateway send to {} failed: {}", to, e))?;

        let timestamp = resp
            .timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Ok(SendReceipt {
            id: resp.id,
            timestamp,
        })
    }

    fn add_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner.handlers.write().push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_message() {
        let event = parse_event(&json!({
            "type": "message",
            "sender": "1234@s.whatsapp.net",
            "conversation": "hello"
        }));
        assert_eq!(
            event,
            InboundEvent::Message(MessageEvent {
                sender: Jid::parse("1234@s.whatsapp.net"),
                body: MessageBody::PlainText("hello".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_extended_text_when_conversation_empty() {
        let event = parse_event(&json!({
            "type": "message",
            "sender": "1234@s.whatsapp.net",
            "conversation": "",
            "extended_text": "look at this"
        }));
        match event {
            InboundEvent::Message(msg) => {
                assert_eq!(msg.body, MessageBody::ExtendedText("look at this".to_string()))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_media_message_unrecognized() {
        let event = parse_event(&json!({
            "type": "message",
            "sender": "1234@s.whatsapp.net",
            "image": {"mimetype": "image/jpeg"}
        }));
        match event {
            InboundEvent::Message(msg) => assert_eq!(msg.body, MessageBody::Unrecognized),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_and_unknown_events() {
        assert_eq!(parse_event(&json!({"type": "connected"})), InboundEvent::Connected);
        assert_eq!(
            parse_event(&json!({"type": "offline_sync_completed"})),
            InboundEvent::OfflineSyncCompleted
        );
        assert_eq!(parse_event(&json!({"type": "logged_out"})), InboundEvent::LoggedOut);
        assert_eq!(
            parse_event(&json!({"type": "disconnected"})),
            InboundEvent::Disconnected
        );
        assert_eq!(
            parse_event(&json!({"type": "receipt", "ids": ["A"]})),
            InboundEvent::Unknown("receipt".to_string())
        );
        assert_eq!(
            parse_event(&json!({"no_type": true})),
            InboundEvent::Unknown("unknown".to_string())
        );
    }

    #[test]
    fn test_parse_pairing_responses() {
        let code: PairResponse =
            serde_json::from_str(r#"{"event":"code","code":"2@abc,def"}"#).unwrap();
        assert_eq!(parse_pairing(code), Some(PairingEvent::Code("2@abc,def".to_string())));

        let success: PairResponse = serde_json::from_str(
            r#"{"event":"success","jid":"15550001111:3@s.whatsapp.net","token":"t"}"#,
        )
        .unwrap();
        assert_eq!(
            parse_pairing(success),
            Some(PairingEvent::Success {
                jid: Jid::parse("15550001111:3@s.whatsapp.net"),
                token: "t".to_string(),
            })
        );

        let pending: PairResponse = serde_json::from_str(r#"{"event":"pending"}"#).unwrap();
        assert_eq!(parse_pairing(pending), None);

        let failed: PairResponse =
            serde_json::from_str(r#"{"event":"err-client-outdated"}"#).unwrap();
        assert_eq!(
            parse_pairing(failed),
            Some(PairingEvent::Error("err-client-outdated".to_string()))
        );
    }

    #[test]
    fn test_message_id_format() {
        let id = new_message_id();
        assert_eq!(id.len(), 20);
        assert!(id.starts_with("3EB0"));
        assert_ne!(id, new_message_id());
    }

    #[test]
    fn test_huge_poll_wait_does_not_overflow() {
        let mut config = RelayConfig::for_gateway("http://127.0.0.1:9");
        config.event_poll_wait_secs = u64::MAX;
        assert!(GatewayClient::new(config, &Device::new()).is_ok());
    }

    #[tokio::test]
    async fn test_send_requires_paired_device() {
        let client =
            GatewayClient::new(RelayConfig::for_gateway("http://127.0.0.1:9"), &Device::new())
                .unwrap();
        let err = client
            .send_text(&Jid::user("15551234567"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotPaired));
    }
}
