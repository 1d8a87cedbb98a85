//! Pure Rust library for dumping the calibration EEPROM of Atheros
//! wireless NICs.
//!
//! Atheros chips keep their factory RF calibration data in an on-board
//! EEPROM that is reachable through a memory-mapped register window. The
//! binary layout of that data differs per chipset generation, and its
//! byte order is not reliably knowable in advance. This crate reads the
//! raw words, resolves the byte order with a multi-stage heuristic,
//! validates the XOR checksum and renders the decoded calibration tables
//! as human-readable text.
//!
//! # Quick start
//!
//! ```no_run
//! use edump::{EepMap, PciConnector, PciSlot, Session};
//!
//! let slot: PciSlot = "0000:03:00".parse()?;
//! let con = PciConnector::open(&slot)?;
//! let mut session = Session::new(con)?;
//!
//! let mut ops = EepMap::select(session.revision()).ops();
//! ops.fill(&mut session)?;
//! ops.check()?;
//!
//! let mut out = String::new();
//! ops.dump_base_header(&mut out)?;
//! print!("{out}");
//! # Ok::<(), edump::Error>(())
//! ```
//!
//! # Features
//!
//! - **Generation dispatch**: one extractor per EEPROM layout (AR5416
//!   default, AR9285 4K, AR9287, AR9300+, QCA6174), selected from the
//!   chip revision with a total default fallback.
//! - **Byte-order resolution**: magic word, capability-flag pair and
//!   calibration build number heuristics, with a named little-endian
//!   tie-break.
//! - **Structured decoding**: sentinel-terminated target-power tables,
//!   CTL band-edge lists with packed power bytes, init-region register
//!   records.
//! - **Deterministic formatting**: all dump entry points write to any
//!   [`std::fmt::Write`] sink.

pub mod connector;
pub mod constants;
pub mod eeprom;
pub mod error;
pub mod pci;
pub mod session;
pub mod types;

// ---- Convenience re-exports ----

pub use connector::Connector;
pub use eeprom::{EepMap, EepromOps};
pub use error::{Error, Result};
pub use pci::{PciConnector, PciSlot};
pub use session::Session;
pub use types::{ChipRevision, DumpSection};
