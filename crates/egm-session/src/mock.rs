//! Mock transport for testing engines without hardware.
//!
//! [`MockLink`] implements [`Transport`] over a pair of channels; the
//! paired [`MockLinkHandle`] plays the device side: it receives every
//! frame the engine writes and injects the bytes the "device" sends back,
//! in whatever chunking the test wants (whole frames, single bytes,
//! frames with leading noise).
//!
//! ```
//! use egm_session::{MockLink, Transport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> egm_core::Result<()> {
//!     let (mut link, mut device) = MockLink::new();
//!
//!     link.write_frame(&[0xFC, 0x05, 0x11]).await?;
//!     assert_eq!(device.next_sent().await.unwrap(), vec![0xFC, 0x05, 0x11]);
//!
//!     device.inject(&[0xAA, 0xBB]);
//!     assert_eq!(&link.read_chunk().await?[..], &[0xAA, 0xBB]);
//!     Ok(())
//! }
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;

use egm_core::{Error, Result};

use crate::transport::Transport;

/// In-memory transport endpoint held by the engine under test.
#[derive(Debug)]
pub struct MockLink {
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
}

/// Device side of a [`MockLink`].
///
/// Dropping the handle hangs up the link: the engine's next read resolves
/// with `Disconnected`.
#[derive(Debug)]
pub struct MockLinkHandle {
    inject_tx: mpsc::UnboundedSender<Vec<u8>>,
    sent_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockLink {
    /// Create a connected link/handle pair.
    pub fn new() -> (Self, MockLinkHandle) {
        let (inject_tx, incoming) = mpsc::unbounded_channel();
        let (outgoing, sent_rx) = mpsc::unbounded_channel();
        (
            Self { incoming, outgoing },
            MockLinkHandle { inject_tx, sent_rx },
        )
    }
}

impl Transport for MockLink {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.outgoing
            .send(frame.to_vec())
            .map_err(|_| Error::Disconnected)
    }

    async fn read_chunk(&mut self) -> Result<Bytes> {
        match self.incoming.recv().await {
            Some(bytes) => Ok(Bytes::from(bytes)),
            None => Err(Error::Disconnected),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.incoming.close();
        Ok(())
    }
}

impl MockLinkHandle {
    /// Inject bytes as if the device had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        // A dropped link just means the engine went away first.
        let _ = self.inject_tx.send(bytes.to_vec());
    }

    /// Await the next frame the engine wrote to the link.
    pub async fn next_sent(&mut self) -> Option<Vec<u8>> {
        self.sent_rx.recv().await
    }

    /// Pop an already-written frame without waiting.
    pub fn try_next_sent(&mut self) -> Option<Vec<u8>> {
        self.sent_rx.try_recv().ok()
    }
}
