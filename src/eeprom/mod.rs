//! EEPROM layout generations and the revision-based dispatch.
//!
//! Every chipset generation stores its calibration data in a different
//! binary layout. Each layout gets one [`EepromOps`] implementation:
//!
//! - [`def`] - AR5416/AR5418/AR9160/AR9280 ("default" layout).
//! - [`map4k`] - AR9285 (4 KB EEPROM).
//! - [`map9287`] - AR9287.
//! - [`map9003`] - AR9300 and later single-chip designs.
//! - [`qca6174`] - QCA6174 (base header only).
//!
//! [`EepMap::select`] picks the layout for a chip revision, newest and
//! most specific first; the default arm makes the selection total.

pub(crate) mod common;
pub mod def;
pub mod map4k;
pub mod map9003;
pub mod map9287;
pub mod qca6174;

use std::fmt;

use crate::connector::Connector;
use crate::error::Result;
use crate::session::Session;
use crate::types::ChipRevision;

pub use common::{calc_csum, ctl_edge_flags, ctl_edge_power, fbin2freq};

/// The capability set every EEPROM generation implements.
///
/// `fill` must be called first (it resolves the byte order and loads the
/// raw image), then `check`; the dump entry points render already-decoded
/// sections into a text sink and perform no hardware access.
pub trait EepromOps<C: Connector> {
    /// Resolve byte order and load the raw image from the word source.
    fn fill(&mut self, session: &mut Session<C>) -> Result<()>;

    /// Validate the loaded image: checksum plus layout-specific header
    /// sanity checks.
    fn check(&mut self) -> Result<()>;

    /// Render the base header.
    fn dump_base_header(&self, w: &mut dyn fmt::Write) -> Result<()>;

    /// Render the modal header(s).
    fn dump_modal_header(&self, w: &mut dyn fmt::Write) -> Result<()>;

    /// Render the power calibration info (target powers and CTLs).
    fn dump_power_info(&self, w: &mut dyn fmt::Write) -> Result<()>;
}

/// The known EEPROM layout generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EepMap {
    /// AR5416-style layout, the fallback for unrecognized revisions.
    Default,
    /// AR9285 4 KB layout.
    Map4k,
    /// AR9287 layout.
    Map9287,
    /// AR9300-or-later layout.
    Map9003,
    /// QCA6174 layout.
    Qca6174,
}

impl EepMap {
    /// Select the layout for a chip revision.
    ///
    /// Total by construction: anything unrecognized decodes with the
    /// default AR5416-style layout.
    pub fn select(rev: ChipRevision) -> Self {
        if rev.is_6174() {
            EepMap::Qca6174
        } else if rev.is_9300_or_later() {
            EepMap::Map9003
        } else if rev.is_9287() {
            EepMap::Map9287
        } else if rev.is_9285() {
            EepMap::Map4k
        } else {
            EepMap::Default
        }
    }

    /// Construct the extractor for this layout.
    pub fn ops<C: Connector>(self) -> Box<dyn EepromOps<C>> {
        match self {
            EepMap::Default => Box::new(def::EepDef::new()),
            EepMap::Map4k => Box::new(map4k::Eep4k::new()),
            EepMap::Map9287 => Box::new(map9287::Eep9287::new()),
            EepMap::Map9003 => Box::new(map9003::Eep9003::new()),
            EepMap::Qca6174 => Box::new(qca6174::Eep6174::new()),
        }
    }
}
