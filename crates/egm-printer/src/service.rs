//! Actor service wrapping a [`PrinterEngine`].
//!
//! Same shape as the note-acceptor service: one dedicated task owns the
//! engine, a cloneable handle feeds it requests over a channel, and the
//! poll tick shares the loop so exactly one exchange is ever on the wire.
//! Print requests carry a reply slot so the caller learns whether the job
//! started or was refused.

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::warn;

use egm_core::{Error, Result};
use egm_session::Transport;

use crate::engine::{PrintJob, PrintOutcome, PrinterEngine};
use crate::templates::{RegionDef, TemplateDef};

/// Requests external callers may hand to the printer loop.
#[derive(Debug)]
pub enum PrinterRequest {
    DefineRegion(RegionDef),
    DefineTemplate(TemplateDef),
    Print(PrintJob, oneshot::Sender<PrintOutcome>),
    Close,
}

/// Cloneable sender half for the printer loop.
#[derive(Debug, Clone)]
pub struct PrinterHandle {
    tx: mpsc::Sender<PrinterRequest>,
}

impl PrinterHandle {
    pub async fn define_region(&self, def: RegionDef) -> Result<()> {
        self.send(PrinterRequest::DefineRegion(def)).await
    }

    pub async fn define_template(&self, def: TemplateDef) -> Result<()> {
        self.send(PrinterRequest::DefineTemplate(def)).await
    }

    /// Submit a ticket and await the start/refusal decision.
    pub async fn print(&self, job: PrintJob) -> Result<PrintOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PrinterRequest::Print(job, reply_tx)).await?;
        reply_rx.await.map_err(|_| Error::ChannelClosed)
    }

    pub async fn close(&self) -> Result<()> {
        self.send(PrinterRequest::Close).await
    }

    async fn send(&self, request: PrinterRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Create the request channel for one printer loop.
pub fn service_channel() -> (PrinterHandle, mpsc::Receiver<PrinterRequest>) {
    let (tx, rx) = mpsc::channel(16);
    (PrinterHandle { tx }, rx)
}

/// Drive one printer until closed.
pub async fn run_service<T: Transport>(
    mut engine: PrinterEngine<T>,
    mut requests: mpsc::Receiver<PrinterRequest>,
) -> Result<()> {
    engine.open().await?;

    let mut ticker = tokio::time::interval(engine.config().poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let outcome = tokio::select! {
            request = requests.recv() => match request {
                Some(PrinterRequest::DefineRegion(def)) => engine.define_region(def).await,
                Some(PrinterRequest::DefineTemplate(def)) => engine.define_template(def).await,
                Some(PrinterRequest::Print(job, reply)) => {
                    match engine.print(&job).await {
                        Ok(outcome) => {
                            // Caller may have given up waiting; that is fine.
                            let _ = reply.send(outcome);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                Some(PrinterRequest::Close) | None => {
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
            warn!(error = %e, "printer loop recovered from error");
        }
    }
}
