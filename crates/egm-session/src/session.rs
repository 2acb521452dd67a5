//! Transport session: one request on the wire at a time, inside a
//! bounded response window.
//!
//! The session owns the link and the stream parser and exposes a single
//! primitive: send a frame, await exactly one complete reply frame. Three
//! timing rules apply:
//!
//! - at most one request may be outstanding ([`Error::RequestInFlight`]
//!   otherwise);
//! - a reply must arrive within the window for the current lifecycle
//!   phase. Devices answer their first post-power-up exchanges far more
//!   slowly than steady-state polls, so initialization runs a longer
//!   window;
//! - a reply that completes faster than [`SessionTiming::minimum_response_time`]
//!   is physically implausible for a multi-byte serial exchange and is
//!   discarded as a stale leftover from an abandoned request.
//!
//! Timeouts and framing problems come back as values; the caller decides
//! policy (retry, fault escalation, give up).

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, trace};

use egm_core::constants::{
    DEFAULT_COMMUNICATION_TIMEOUT_MS, DEFAULT_INITIALIZATION_TIMEOUT_MS,
    DEFAULT_MINIMUM_RESPONSE_TIME_MS,
};
use egm_core::{Error, Result};
use egm_protocol::{FrameSchema, StreamParser};

use crate::transport::Transport;

/// Response-window configuration for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Window during normal operation.
    pub communication_timeout: Duration,
    /// Window during device bring-up.
    pub initialization_timeout: Duration,
    /// Floor below which a reply is treated as stale.
    pub minimum_response_time: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            communication_timeout: Duration::from_millis(DEFAULT_COMMUNICATION_TIMEOUT_MS),
            initialization_timeout: Duration::from_millis(DEFAULT_INITIALIZATION_TIMEOUT_MS),
            minimum_response_time: Duration::from_millis(DEFAULT_MINIMUM_RESPONSE_TIME_MS),
        }
    }
}

/// Which response window is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Device bring-up; the longer window applies.
    Initializing,
    /// Steady state.
    Operating,
}

/// Owns the link and enforces the request/response discipline.
pub struct TransportSession<T: Transport> {
    transport: T,
    parser: StreamParser,
    timing: SessionTiming,
    phase: LifecyclePhase,
    in_flight: bool,
}

impl<T: Transport> TransportSession<T> {
    pub fn new(transport: T, schema: &FrameSchema, timing: SessionTiming) -> Self {
        Self {
            transport,
            parser: StreamParser::for_schema(schema),
            timing,
            phase: LifecyclePhase::Initializing,
            in_flight: false,
        }
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Switch response windows; called once bring-up finishes (and again
    /// if the device re-initializes).
    pub fn set_phase(&mut self, phase: LifecyclePhase) {
        self.phase = phase;
    }

    fn window(&self) -> Duration {
        match self.phase {
            LifecyclePhase::Initializing => self.timing.initialization_timeout,
            LifecyclePhase::Operating => self.timing.communication_timeout,
        }
    }

    /// Send one frame and await one complete reply frame.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestInFlight`]: a previous call has not resolved
    /// - [`Error::ResponseTimeout`]: nothing plausible arrived in the
    ///   phase window
    /// - [`Error::Disconnected`]: the link closed mid-exchange
    pub async fn send_and_await(&mut self, frame: &[u8]) -> Result<Bytes> {
        if self.in_flight {
            return Err(Error::RequestInFlight);
        }
        self.in_flight = true;
        let result = self.exchange(frame).await;
        self.in_flight = false;
        result
    }

    async fn exchange(&mut self, frame: &[u8]) -> Result<Bytes> {
        // A straggler from an abandoned exchange must not answer this one.
        self.parser.reset();

        self.transport.write_frame(frame).await?;
        trace!(bytes = frame.len(), "frame sent");

        let window = self.window();
        let started = Instant::now();

        loop {
            let Some(remaining) = window.checked_sub(started.elapsed()) else {
                return Err(Error::ResponseTimeout {
                    timeout_ms: window.as_millis() as u64,
                });
            };

            let chunk = match tokio::time::timeout(remaining, self.transport.read_chunk()).await {
                Ok(read) => read?,
                Err(_) => {
                    return Err(Error::ResponseTimeout {
                        timeout_ms: window.as_millis() as u64,
                    });
                }
            };
            self.parser.feed(&chunk);

            while let Some(reply) = self.parser.next_frame() {
                if started.elapsed() < self.timing.minimum_response_time {
                    debug!(
                        elapsed_us = started.elapsed().as_micros() as u64,
                        "reply faster than the line allows, discarding as stale"
                    );
                    continue;
                }
                return Ok(reply);
            }
        }
    }

    /// Close the link; any later exchange resolves `Disconnected`.
    pub async fn close(&mut self) -> Result<()> {
        self.parser.reset();
        self.transport.close().await
    }
}
