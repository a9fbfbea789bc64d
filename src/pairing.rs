//! QR pairing flow for unpaired devices

use anyhow::{Result, anyhow};
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::types::{Jid, PairingEvent};

/// Render a pairing code as a half-block QR pattern for the terminal
pub fn render_code(code: &str) -> Result<String> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Consume pairing events until the flow ends
///
/// Codes are written to `out` as they rotate. Returns the paired identity on
/// success; a timeout, an error or a closed channel is a failure.
pub async fn run_pairing<W: Write>(
    mut events: mpsc::Receiver<PairingEvent>,
    out: &mut W,
) -> Result<(Jid, String)> {
    while let Some(event) = events.recv().await {
        match event {
            PairingEvent::Code(code) => {
                let rendered = render_code(&code)?;
                writeln!(out, "{}", rendered)?;
                out.flush()?;
                info!("Scan the QR code above to link this device");
            }
            PairingEvent::Success { jid, token } => {
                info!("QR Channel result: success ({})", jid);
                return Ok((jid, token));
            }
            PairingEvent::Timeout => {
                warn!("QR Channel result: timeout");
                return Err(anyhow!("Pairing timed out before the code was scanned"));
            }
            PairingEvent::Error(reason) => {
                warn!("QR Channel result: {}", reason);
                return Err(anyhow!("Pairing failed: {}", reason));
            }
        }
    }

    Err(anyhow!("Pairing channel closed before completion"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_code_uses_half_blocks() {
        let rendered = render_code("2@abcdef,ghijkl,mnopqr").unwrap();
        assert!(rendered.lines().count() > 10);
        assert!(rendered.chars().any(|c| c == '▀' || c == '▄' || c == '█'));
    }

    #[tokio::test]
    async fn test_pairing_success_after_codes() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(PairingEvent::Code("2@first".to_string())).await.unwrap();
        tx.send(PairingEvent::Code("2@second".to_string())).await.unwrap();
        tx.send(PairingEvent::Success {
            jid: Jid::parse("15550001111:3@s.whatsapp.net"),
            token: "tok".to_string(),
        })
        .await
        .unwrap();

        let mut out = Vec::new();
        let (jid, token) = run_pairing(rx, &mut out).await.unwrap();

        assert_eq!(jid.to_string(), "15550001111:3@s.whatsapp.net");
        assert_eq!(token, "tok");
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn test_pairing_timeout_is_error() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(PairingEvent::Timeout).await.unwrap();

        let err = run_pairing(rx, &mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_pairing_closed_channel_is_error() {
        let (tx, rx) = mpsc::channel::<PairingEvent>(1);
        drop(tx);

        assert!(run_pairing(rx, &mut Vec::new()).await.is_err());
    }
}
