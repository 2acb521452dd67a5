//! Actor service wrapping a [`ValidatorEngine`].
//!
//! Each device runs as one dedicated task: the engine's transport I/O,
//! decoding, state transitions and fault aggregation all happen
//! sequentially on that task, in arrival order. External callers never
//! touch engine state; they hand requests to the task over a channel via
//! [`ValidatorHandle`], which is safe to clone into any thread.
//!
//! The caller spawns the loop with a concrete transport:
//!
//! ```no_run
//! use egm_session::MockLink;
//! use egm_validator::{ValidatorConfig, ValidatorEngine, run_service, service_channel};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> egm_core::Result<()> {
//! let (link, _device) = MockLink::new();
//! let (events_tx, mut events) = mpsc::unbounded_channel();
//! let engine = ValidatorEngine::new(link, ValidatorConfig::default(), events_tx);
//!
//! let (handle, requests) = service_channel();
//! let task = tokio::spawn(run_service(engine, requests));
//!
//! handle.enable(true).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! handle.close().await?;
//! # task.await.unwrap()
//! # }
//! ```

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use egm_core::{Error, Result};
use egm_session::Transport;

use crate::engine::ValidatorEngine;

/// Requests external callers may hand to the device loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorRequest {
    /// Enable or inhibit note acceptance.
    Enable(bool),
    /// Stack the escrowed note.
    Accept,
    /// Return the escrowed note.
    Return,
    /// Close the link and end the loop.
    Close,
}

/// Cloneable sender half for the device loop.
#[derive(Debug, Clone)]
pub struct ValidatorHandle {
    tx: mpsc::Sender<ValidatorRequest>,
}

impl ValidatorHandle {
    pub async fn enable(&self, enable: bool) -> Result<()> {
        self.send(ValidatorRequest::Enable(enable)).await
    }

    pub async fn accept(&self) -> Result<()> {
        self.send(ValidatorRequest::Accept).await
    }

    pub async fn return_note(&self) -> Result<()> {
        self.send(ValidatorRequest::Return).await
    }

    pub async fn close(&self) -> Result<()> {
        self.send(ValidatorRequest::Close).await
    }

    async fn send(&self, request: ValidatorRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Create the request channel for one device loop.
pub fn service_channel() -> (ValidatorHandle, mpsc::Receiver<ValidatorRequest>) {
    let (tx, rx) = mpsc::channel(16);
    (ValidatorHandle { tx }, rx)
}

/// Drive one note acceptor until closed.
///
/// Opens the device, then alternates between the fixed-cadence poll tick
/// and incoming requests; the select serializes them, so exactly one
/// exchange is ever on the wire. Recoverable trouble is logged and the
/// loop keeps running; only a dead link ends it with an error.
pub async fn run_service<T: Transport>(
    mut engine: ValidatorEngine<T>,
    mut requests: mpsc::Receiver<ValidatorRequest>,
) -> Result<()> {
    engine.open().await?;

    let mut ticker = tokio::time::interval(engine.config().poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let outcome = tokio::select! {
            request = requests.recv() => match request {
                Some(ValidatorRequest::Enable(enable)) => engine.enable(enable).await,
                Some(ValidatorRequest::Accept) => engine.accept().await,
                Some(ValidatorRequest::Return) => engine.return_note().await,
                Some(ValidatorRequest::Close) | None => {
                    engine.close().await.ok();
                    return Ok(());
                }
            },
            _ = ticker.tick() => engine.poll_tick().await.map(|_| ()),
        };

        if let Err(e) = outcome {
            if !e.is_recoverable() {
                engine.close().await.ok();
                return Err(e);
            }
            warn!(error = %e, "device loop recovered from error");
        }
    }
}
