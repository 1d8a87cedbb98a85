//! Error types for the edump crate.

/// The error type for EEPROM dump operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error from the register connector.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A busy-wait on a status register expired before the condition held.
    #[error("timed out waiting on register 0x{reg:08X}")]
    ReadTimeout {
        /// The polled register address.
        reg: u32,
    },

    /// The PCI device identity is not in the known Atheros set.
    #[error("device {vendor:04x}:{device:04x} is not supported")]
    UnsupportedDevice {
        /// PCI vendor ID.
        vendor: u16,
        /// PCI device ID.
        device: u16,
    },

    /// The EEPROM magic word matches neither byte order.
    #[error("invalid EEPROM magic 0x{magic:04X}")]
    BadMagic {
        /// The magic word as read.
        magic: u16,
    },

    /// The EEPROM image failed checksum verification.
    #[error("EEPROM checksum mismatch (XOR fold 0x{sum:04X})")]
    ChecksumMismatch {
        /// The non-zero fold of the checked region.
        sum: u16,
    },

    /// The base header declares an implausible image length.
    #[error("implausible EEPROM length field {length}")]
    BadLength {
        /// The declared length in bytes.
        length: u16,
    },

    /// The base header carries an unknown layout version.
    #[error("unsupported EEPROM version 0x{version:04X}")]
    BadVersion {
        /// The version word as read.
        version: u16,
    },

    /// The command-line device selector could not be parsed.
    #[error("malformed PCI slot specification: {0}")]
    MalformedSelector(String),

    /// A text formatting error while rendering a dump.
    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    /// Whether this error was caused by bad command-line input rather
    /// than by the hardware or the EEPROM content.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::MalformedSelector(_))
    }
}

/// A specialized `Result` type for EEPROM dump operations.
pub type Result<T> = std::result::Result<T, Error>;
