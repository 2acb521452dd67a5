//! Shared value types for the peripheral layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A note denomination in minor currency units (e.g. cents).
///
/// The device reports an escrow code; the platform assigns the value. A
/// denomination of 2000 with currency `EUR` is a 20 € note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denomination(pub u32);

impl Denomination {
    pub fn as_minor_units(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 alpha-3 currency identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Parse an alpha-3 code. Accepts exactly three ASCII letters,
    /// normalized to upper case.
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidCurrencyCode(code.to_string()));
        }
        let mut inner = [0u8; 3];
        for (slot, b) in inner.iter_mut().zip(bytes) {
            *slot = b.to_ascii_uppercase();
        }
        Ok(Self(inner))
    }

    pub fn as_str(&self) -> &str {
        // Constructor guarantees ASCII letters.
        std::str::from_utf8(&self.0).expect("currency code is ASCII")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

/// A platform-assigned note value: denomination plus currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteValue {
    pub denomination: Denomination,
    pub currency: CurrencyCode,
}

impl NoteValue {
    pub fn new(denomination: u32, currency: CurrencyCode) -> Self {
        Self {
            denomination: Denomination(denomination),
            currency,
        }
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.denomination, self.currency)
    }
}

/// Firmware identity discovered during device initialization.
///
/// The override resolver keys template/region remapping rules on the
/// protocol name and a firmware-version prefix, so both are kept verbatim
/// as the device reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// Protocol family the device speaks (e.g. a vendor protocol name).
    pub protocol: String,
    /// Firmware version string as reported.
    pub version: String,
    /// Boot-block version, when the device reports one separately.
    pub boot_version: Option<String>,
}

impl FirmwareInfo {
    pub fn new(protocol: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            version: version.into(),
            boot_version: None,
        }
    }
}

/// Peripheral device classes handled by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    NoteAcceptor,
    TicketPrinter,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::NoteAcceptor => f.write_str("note-acceptor"),
            DeviceClass::TicketPrinter => f.write_str("ticket-printer"),
        }
    }
}
