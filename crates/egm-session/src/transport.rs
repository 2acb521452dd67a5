//! Raw byte transport abstraction.
//!
//! The physical link (a UART behind a serial device node) is deliberately
//! the thinnest seam in the stack: something that can write a frame's
//! bytes, hand back whatever bytes have arrived, and close. Framing,
//! timing windows and retries all live above it, which is what makes the
//! engines testable against [`MockLink`](crate::mock::MockLink).
//!
//! Traits use native `async fn` (Edition 2024 RPITIT); engines are generic
//! over the transport and monomorphize, so no trait objects are involved.

#![allow(async_fn_in_trait)]

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use egm_core::{Error, Result};

/// How long one blocking serial read waits before checking for close.
const READ_SLICE_MS: u64 = 50;

/// Byte-level link to one peripheral.
///
/// Exactly one engine owns a transport; serial links are half-duplex and
/// the one-outstanding-request rule is enforced a layer up.
pub trait Transport: Send {
    /// Write one encoded frame to the link.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Await the next chunk of raw bytes from the link.
    ///
    /// Pends until at least one byte arrives. A closed or dead link
    /// resolves with [`Error::Disconnected`].
    async fn read_chunk(&mut self) -> Result<Bytes>;

    /// Close the link. Subsequent reads resolve with
    /// [`Error::Disconnected`].
    async fn close(&mut self) -> Result<()>;
}

/// Serial-port transport over a TTY device node.
///
/// `serialport` I/O is blocking, so reads and writes hop onto the
/// blocking pool; the engine task itself never blocks the runtime.
pub struct SerialLink {
    port: Arc<Mutex<Box<dyn serialport::SerialPort>>>,
    closed: Arc<AtomicBool>,
    path: String,
}

impl SerialLink {
    /// Open a serial device at the given baud rate.
    ///
    /// Peripheral links run 8 data bits, no parity, one stop bit, no flow
    /// control. The short port timeout is a scheduling slice, not the
    /// protocol response window, which is enforced by the session.
    ///
    /// An open failure is the one hard failure this layer surfaces.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .flow_control(serialport::FlowControl::None)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(READ_SLICE_MS))
            .open()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            closed: Arc::new(AtomicBool::new(false)),
            path: path.to_string(),
        })
    }

    /// Device node this link was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialLink {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::Disconnected);
        }
        let port = Arc::clone(&self.port);
        let bytes = frame.to_vec();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = port.lock().expect("serial port lock");
            std::io::Write::write_all(&mut *guard, &bytes)?;
            std::io::Write::flush(&mut *guard)?;
            Ok(())
        })
        .await
        .map_err(|_| Error::Disconnected)?
    }

    async fn read_chunk(&mut self) -> Result<Bytes> {
        loop {
            if self.closed.load(Ordering::Relaxed) {
                return Err(Error::Disconnected);
            }
            let port = Arc::clone(&self.port);
            // If the caller's timeout drops this future mid-read, the
            // blocking task finishes its slice on its own and the bytes it
            // read are lost; the next poll cycle reconciles.
            let chunk = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
                let mut guard = port.lock().expect("serial port lock");
                let mut buf = [0u8; 256];
                match guard.read(&mut buf) {
                    Ok(0) => Ok(Vec::new()),
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
                    Err(e) => Err(Error::Io(e)),
                }
            })
            .await
            .map_err(|_| Error::Disconnected)??;

            if !chunk.is_empty() {
                trace!(bytes = chunk.len(), "serial read");
                return Ok(Bytes::from(chunk));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
