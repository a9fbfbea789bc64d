//! WhatsApp Relay - Main Entry Point
//!
//! 1. Loads (or creates) the linked device from the local store
//! 2. Pairs via QR code on first start, otherwise reconnects
//! 3. Logs inbound events and serves `POST /send` on port 8080

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whatsapp_relay::config::{LISTEN_ADDR, RelayConfig};
use whatsapp_relay::relay::TracingSink;
use whatsapp_relay::{
    DeviceStore, EventRelay, GatewayClient, MessageSender, MessagingClient, api, pairing,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,whatsapp_relay=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("WhatsApp relay starting...");

    let config = RelayConfig::from_env()?;
    info!("Configuration loaded");

    let store = DeviceStore::new(&config.store_path)
        .with_context(|| format!("Failed to open device store at {:?}", config.store_path))?;
    let mut device = store.first_device().context("Failed to get device")?;

    let gateway = GatewayClient::new(config.clone(), &device).context("Failed to create client")?;
    let client: Arc<dyn MessagingClient> = Arc::new(gateway);

    // Handlers go in before connecting so no early event is missed
    client.add_event_handler(Arc::new(EventRelay::new(Arc::new(TracingSink))));

    if device.is_paired() {
        client.connect().await.context("Failed to connect")?;
    } else {
        info!("No stored device identity, starting QR pairing");
        let events = client
            .pairing_channel()
            .await
            .context("Failed to open pairing channel")?;
        client.connect().await.context("Failed to connect")?;

        let (jid, token) = pairing::run_pairing(events, &mut std::io::stdout()).await?;
        device.mark_paired(jid.to_string(), token);
        store
            .save_device(&device)
            .context("Failed to save paired device")?;
        info!("Device {} linked and saved", jid);
    }

    let sender = MessageSender::new(client.clone());
    let addr: SocketAddr = LISTEN_ADDR.parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let mut server = tokio::spawn(api::run_server(listener, sender));

    // Run until Ctrl-C or until the server stops on its own
    let served = tokio::select! {
        result = &mut server => Some(result),
        ctrl_c = signal::ctrl_c() => {
            match ctrl_c {
                Ok(()) => info!("Shutdown signal received"),
                Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
            }
            None
        }
    };

    if served.is_none() {
        server.abort();
    }
    if let Err(e) = client.disconnect().await {
        tracing::warn!("Disconnect failed: {}", e);
    }

    if let Some(result) = served {
        result
            .context("HTTP server task failed")?
            .context("HTTP server error")?;
    }

    info!("WhatsApp relay stopped");
    Ok(())
}
