use thiserror::Error;

/// Result type alias for peripheral operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a cabinet peripheral.
///
/// Framing problems (bad sync, length disagreement, checksum mismatch) are
/// recoverable by discarding the frame and waiting for the next poll; the
/// command engine never lets them reach device-state logic as failures.
/// Use [`Error::is_framing`] to classify.
#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("Sync byte mismatch: expected {expected:#04x}, got {actual:#04x}")]
    SyncMismatch { expected: u8, actual: u8 },

    #[error("Frame length mismatch: declared {declared}, received {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Frame too short: {length} bytes, schema needs at least {minimum}")]
    FrameTooShort { length: usize, minimum: usize },

    #[error("Payload too large: {size} bytes, limit {max_size}")]
    PayloadTooLarge { size: usize, max_size: usize },

    // Session errors
    #[error("No response within {timeout_ms}ms")]
    ResponseTimeout { timeout_ms: u64 },

    #[error("Link disconnected")]
    Disconnected,

    #[error("A request is already outstanding on this session")]
    RequestInFlight,

    // Device errors
    #[error("Device configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Informational query exhausted {attempts} attempts")]
    QueryExhausted { attempts: u32 },

    #[error("Device request channel closed")]
    ChannelClosed,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid currency code: {0}")]
    InvalidCurrencyCode(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from byte-level framing of a received frame.
    ///
    /// Framing errors discard the frame; the next poll cycle reconciles.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Error::SyncMismatch { .. }
                | Error::LengthMismatch { .. }
                | Error::ChecksumMismatch { .. }
                | Error::FrameTooShort { .. }
        )
    }

    /// Whether the caller may keep polling after this error.
    ///
    /// Only a dead link or a closed request channel ends the loop.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Disconnected | Error::ChannelClosed)
    }

    /// Create a protocol-violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
