//! Command/response engine: typed exchanges plus retry policy.
//!
//! The engine layers the per-command policy over the session primitive:
//!
//! - **Informational queries** (version, boot info, currency table) are
//!   retried up to a fixed bound and fail hard only once the bound is
//!   exhausted, since nothing else in the bring-up sequence can proceed
//!   without their answers.
//! - **Operational commands** (enable/disable, stack, return, print) are
//!   sent exactly once. Their effect shows up in the next polled status;
//!   where the protocol defines an acknowledgement byte, a missing or
//!   mismatched ack is logged and left for the next poll cycle to
//!   reconcile, never retried.
//!
//! Framing failures and timeouts surface as values; they are policy
//! inputs here and never propagate into device-state logic as failures.

use bytes::Bytes;
use tracing::{debug, warn};

use egm_core::constants::INFO_QUERY_ATTEMPTS;
use egm_core::{Error, Result};
use egm_protocol::FrameSchema;

use crate::session::{LifecyclePhase, SessionTiming, TransportSession};
use crate::transport::Transport;

/// One decoded reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Raw status/report byte; the device crates map it into their
    /// vocabulary enums.
    pub code: u8,
    pub payload: Vec<u8>,
}

/// Issues commands one at a time over a [`TransportSession`].
pub struct CommandEngine<T: Transport> {
    session: TransportSession<T>,
    schema: FrameSchema,
}

impl<T: Transport> CommandEngine<T> {
    pub fn new(transport: T, schema: FrameSchema, timing: SessionTiming) -> Self {
        Self {
            session: TransportSession::new(transport, &schema, timing),
            schema,
        }
    }

    pub fn schema(&self) -> &FrameSchema {
        &self.schema
    }

    pub fn set_phase(&mut self, phase: LifecyclePhase) {
        self.session.set_phase(phase);
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.session.phase()
    }

    /// Encode, send, await and decode one exchange.
    pub async fn send_command(&mut self, code: u8, payload: &[u8]) -> Result<Reply> {
        let frame = self.schema.encode(code, payload)?;
        let raw = self.session.send_and_await(&frame).await?;
        self.decode(&raw)
    }

    /// Informational query with bounded retries.
    ///
    /// Makes exactly [`INFO_QUERY_ATTEMPTS`] attempts, retrying on
    /// recoverable failures (timeout, corrupt reply), then reports the
    /// bound exhausted.
    pub async fn query_info(&mut self, code: u8, payload: &[u8]) -> Result<Reply> {
        for attempt in 1..=INFO_QUERY_ATTEMPTS {
            match self.send_command(code, payload).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_recoverable() => {
                    warn!(command = code, attempt, error = %e, "informational query failed");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::QueryExhausted {
            attempts: INFO_QUERY_ATTEMPTS,
        })
    }

    /// Fire-once operational command whose outcome the next poll observes.
    ///
    /// Returns the decoded reply when one arrived; `None` on timeout or a
    /// corrupt reply, both of which are logged and absorbed.
    pub async fn send_operational(&mut self, code: u8, payload: &[u8]) -> Result<Option<Reply>> {
        let frame = self.schema.encode(code, payload)?;
        match self.session.send_and_await(&frame).await {
            Ok(raw) => match self.decode(&raw) {
                Ok(reply) => Ok(Some(reply)),
                Err(e) if e.is_framing() => {
                    warn!(command = code, error = %e, "corrupt reply to operational command");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            Err(Error::ResponseTimeout { timeout_ms }) => {
                debug!(command = code, timeout_ms, "no reply to operational command");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Operational command with a defined acknowledgement byte.
    ///
    /// Returns whether the expected ack arrived. A missing or mismatched
    /// ack is logged, never retried; the next poll cycle reconciles.
    pub async fn send_expecting_ack(
        &mut self,
        code: u8,
        payload: &[u8],
        ack_code: u8,
    ) -> Result<bool> {
        match self.send_operational(code, payload).await? {
            Some(reply) if reply.code == ack_code => Ok(true),
            Some(reply) => {
                warn!(
                    command = code,
                    expected = ack_code,
                    received = reply.code,
                    "unexpected acknowledgement"
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    fn decode(&self, raw: &Bytes) -> Result<Reply> {
        let (code, payload) = self.schema.decode(raw)?;
        Ok(Reply { code, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLink, MockLinkHandle};
    use egm_protocol::VALIDATOR_SCHEMA;
    use std::time::Duration;

    const ACK: u8 = 0x50;

    fn engine_with_device() -> (CommandEngine<MockLink>, MockLinkHandle) {
        let (link, device) = MockLink::new();
        let timing = SessionTiming {
            communication_timeout: Duration::from_millis(500),
            initialization_timeout: Duration::from_secs(5),
            minimum_response_time: Duration::ZERO,
        };
        (CommandEngine::new(link, VALIDATOR_SCHEMA, timing), device)
    }

    #[tokio::test(start_paused = true)]
    async fn command_roundtrip() {
        let (mut engine, device) = engine_with_device();
        device.inject(&VALIDATOR_SCHEMA.encode(0x11, &[]).unwrap());

        let reply = engine.send_command(0x11, &[]).await.unwrap();
        assert_eq!(reply.code, 0x11);
        assert!(reply.payload.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn query_info_retries_then_succeeds() {
        let (mut engine, mut device) = engine_with_device();

        // Silent for two attempts, answers the third.
        tokio::spawn(async move {
            for attempt in 0..3 {
                let sent = device.next_sent().await.unwrap();
                assert_eq!(sent[2], 0x88);
                if attempt == 2 {
                    device.inject(&VALIDATOR_SCHEMA.encode(0x88, b"V1.02").unwrap());
                }
            }
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let reply = engine.query_info(0x88, &[]).await.unwrap();
        assert_eq!(reply.payload, b"V1.02");
    }

    #[tokio::test(start_paused = true)]
    async fn query_info_exhausts_exact_bound() {
        let (mut engine, mut device) = engine_with_device();

        let counter = tokio::spawn(async move {
            let mut sends = 0u32;
            while device.next_sent().await.is_some() {
                sends += 1;
            }
            sends
        });

        let err = engine.query_info(0x8A, &[]).await.unwrap_err();
        assert!(matches!(err, Error::QueryExhausted { attempts: 3 }));

        engine.close().await.unwrap();
        drop(engine);
        assert_eq!(counter.await.unwrap(), 3, "exactly three attempts, no off-by-one");
    }

    #[tokio::test(start_paused = true)]
    async fn operational_timeout_is_absorbed() {
        let (mut engine, _device) = engine_with_device();

        let outcome = engine.send_operational(0x43, &[]).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expected_ack_is_recognized() {
        let (mut engine, device) = engine_with_device();
        device.inject(&VALIDATOR_SCHEMA.encode(ACK, &[]).unwrap());

        assert!(engine.send_expecting_ack(0xC3, &[0x00], ACK).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_ack_is_logged_not_fatal() {
        let (mut engine, device) = engine_with_device();
        device.inject(&VALIDATOR_SCHEMA.encode(0x1A, &[]).unwrap());

        assert!(!engine.send_expecting_ack(0xC3, &[0x00], ACK).await.unwrap());
    }
}
