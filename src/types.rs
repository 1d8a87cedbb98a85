//! Type definitions shared across the crate: chip identification and
//! dump-section selection.

use crate::constants::srev;

/// Decoded MAC/BB silicon revision.
///
/// Populated from the `AR_SREV` register when a [`Session`](crate::Session)
/// is opened. The version code selects the EEPROM layout generation; the
/// revision is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipRevision {
    /// MAC/BB version code.
    pub mac_version: u32,
    /// MAC/BB revision within the version.
    pub mac_rev: u32,
}

impl ChipRevision {
    /// Whether this is an AR9285 ("4K" EEPROM layout).
    #[inline]
    pub fn is_9285(self) -> bool {
        self.mac_version == srev::AR9285
    }

    /// Whether this is an AR9287.
    #[inline]
    pub fn is_9287(self) -> bool {
        self.mac_version == srev::AR9287
    }

    /// Whether this is an AR9340.
    #[inline]
    pub fn is_9340(self) -> bool {
        self.mac_version == srev::AR9340
    }

    /// Whether this is an AR9300-or-later design.
    #[inline]
    pub fn is_9300_or_later(self) -> bool {
        self.mac_version >= srev::AR9300
    }

    /// Whether this is a QCA6174.
    #[inline]
    pub fn is_6174(self) -> bool {
        self.mac_version == srev::QCA6174
    }

    /// Marketing name of the MAC/BB, or `"????"` for unknown versions.
    pub fn name(self) -> &'static str {
        match self.mac_version {
            // Devices with external radios
            srev::AR5416_PCI => "5416",
            srev::AR5416_PCIE => "5418",
            srev::AR9160 => "9160",
            // Single-chip solutions
            srev::AR9280 => "9280",
            srev::AR9285 => "9285",
            srev::AR9287 => "9287",
            srev::AR9300 => "9300",
            srev::AR9330 => "9330",
            srev::AR9485 => "9485",
            srev::AR9462 => "9462",
            srev::AR9565 => "9565",
            srev::AR9340 => "9340",
            srev::AR9550 => "9550",
            srev::QCA6174 => "6174",
            _ => "????",
        }
    }
}

/// Which EEPROM section(s) to dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DumpSection {
    /// Base header only.
    BaseHeader,
    /// Modal header(s) only.
    ModalHeader,
    /// Power calibration info only.
    PowerInfo,
    /// Everything.
    #[default]
    All,
}
