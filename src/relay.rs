//! Event relay - turns inbound events into log lines

use std::sync::Arc;
use tracing::info;

use crate::client::EventHandler;
use crate::types::{InboundEvent, MessageBody, MessageEvent};

/// Destination for relay output, one line per call
pub trait LineSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes relay lines through `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn emit(&self, line: &str) {
        info!(target: "whatsapp_relay::events", "{}", line);
    }
}

/// Logs every event received from the messaging client
#[derive(Clone)]
pub struct EventRelay {
    sink: Arc<dyn LineSink>,
}

impl EventRelay {
    pub fn new(sink: Arc<dyn LineSink>) -> Self {
        Self { sink }
    }

    /// Render the log line for an event
    pub fn describe(event: &InboundEvent) -> String {
        match event {
            InboundEvent::Message(message) => describe_message(message),
            InboundEvent::Connected => "Connected to WhatsApp".to_string(),
            InboundEvent::OfflineSyncCompleted => "Offline sync completed".to_string(),
            InboundEvent::LoggedOut => "Logged out".to_string(),
            InboundEvent::Disconnected => "Disconnected".to_string(),
            InboundEvent::Unknown(kind) => format!("Unhandled event: {}", kind),
        }
    }
}

fn describe_message(message: &MessageEvent) -> String {
    let sender = &message.sender;
    match &message.body {
        MessageBody::PlainText(text) | MessageBody::ExtendedText(text) => {
            format!("Received message from {}: {}", sender, text)
        }
        MessageBody::Unrecognized => format!(
            "Received a message from {}, but could not determine its type",
            sender
        ),
    }
}

impl EventHandler for EventRelay {
    fn handle_event(&self, event: &InboundEvent) {
        self.sink.emit(&Self::describe(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Jid;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl LineSink for RecordingSink {
        fn emit(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }
    }

    fn relay_with_sink() -> (EventRelay, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (EventRelay::new(sink.clone()), sink)
    }

    fn message(body: MessageBody) -> InboundEvent {
        InboundEvent::Message(MessageEvent {
            sender: Jid::parse("1234@server"),
            body,
        })
    }

    #[test]
    fn test_plain_text_message() {
        let (relay, sink) = relay_with_sink();
        relay.handle_event(&message(MessageBody::PlainText("hello".to_string())));

        assert_eq!(
            *sink.lines.lock(),
            vec!["Received message from 1234@server: hello".to_string()]
        );
    }

    #[test]
    fn test_extended_text_message() {
        let (relay, sink) = relay_with_sink();
        relay.handle_event(&message(MessageBody::ExtendedText(
            "see https://example.com".to_string(),
        )));

        assert_eq!(
            *sink.lines.lock(),
            vec!["Received message from 1234@server: see https://example.com".to_string()]
        );
    }

    #[test]
    fn test_unrecognized_message_logs_single_line() {
        let (relay, sink) = relay_with_sink();
        relay.handle_event(&message(MessageBody::Unrecognized));

        let lines = sink.lines.lock();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "Received a message from 1234@server, but could not determine its type"
        );
    }

    #[test]
    fn test_status_events() {
        let (relay, sink) = relay_with_sink();
        relay.handle_event(&InboundEvent::Connected);
        relay.handle_event(&InboundEvent::OfflineSyncCompleted);
        relay.handle_event(&InboundEvent::LoggedOut);
        relay.handle_event(&InboundEvent::Disconnected);

        assert_eq!(
            *sink.lines.lock(),
            vec![
                "Connected to WhatsApp",
                "Offline sync completed",
                "Logged out",
                "Disconnected",
            ]
        );
    }

    #[test]
    fn test_unknown_event() {
        let (relay, sink) = relay_with_sink();
        relay.handle_event(&InboundEvent::Unknown("presence".to_string()));

        assert_eq!(*sink.lines.lock(), vec!["Unhandled event: presence"]);
    }
}
