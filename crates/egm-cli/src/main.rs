//! Operator utility: attach to a note acceptor on a serial device, enable
//! acceptance and log every event the engine emits.
//!
//! ```text
//! egm-cli /dev/ttyUSB0
//! ```

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use egm_session::SerialLink;
use egm_validator::{ValidatorConfig, ValidatorEngine, run_service, service_channel};

const DEFAULT_BAUD: u32 = 9_600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: egm-cli <serial-device>")?;
    let link =
        SerialLink::open(&path, DEFAULT_BAUD).with_context(|| format!("opening {path}"))?;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let engine = ValidatorEngine::new(link, ValidatorConfig::default(), events_tx);
    let (handle, requests) = service_channel();
    let service = tokio::spawn(run_service(engine, requests));

    handle.enable(true).await?;
    info!(device = %path, "note acceptor attached");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                handle.close().await.ok();
                break;
            }
            event = events.recv() => match event {
                Some(event) => info!(?event, "device event"),
                None => break,
            },
        }
    }

    service.await??;
    Ok(())
}
