//! The decode session: chip identification, byteswap state, and the
//! busy-wait EEPROM word read.
//!
//! A [`Session`] owns the register connector for the duration of one dump.
//! It is created once per invocation, identifies the chip from the
//! silicon-revision register, and then serves 16-bit EEPROM word reads to
//! the generation-specific extractors, applying byteswap compensation once
//! the resolver has made its decision.

use std::thread;
use std::time::Duration;

use log::debug;

use crate::connector::Connector;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::ChipRevision;

/// A single-device, single-shot EEPROM decode session.
pub struct Session<C: Connector> {
    con: C,
    rev: ChipRevision,
    io_swap: bool,
}

impl<C: Connector> Session<C> {
    /// Open a session: read and decode the silicon revision.
    pub fn new(con: C) -> Result<Self> {
        let mut session = Session {
            con,
            rev: ChipRevision {
                mac_version: 0,
                mac_rev: 0,
            },
            io_swap: false,
        };
        session.read_revisions()?;
        debug!(
            "MAC/BB {} rev {:x}",
            session.rev.name(),
            session.rev.mac_rev
        );
        Ok(session)
    }

    /// The chip revision read at session start.
    pub fn revision(&self) -> ChipRevision {
        self.rev
    }

    /// Whether byteswap compensation is currently applied to word reads.
    pub fn io_swap(&self) -> bool {
        self.io_swap
    }

    /// Flip the byteswap compensation state.
    ///
    /// Called at most once per session, by the byte-order resolver.
    pub(crate) fn toggle_io_swap(&mut self) {
        self.io_swap = !self.io_swap;
        debug!("EEPROM I/O byteswap compensation now {}", self.io_swap);
    }

    /// Read one 32-bit register.
    pub fn reg_read(&mut self, reg: u32) -> Result<u32> {
        self.con.reg_read(reg)
    }

    /// Poll `reg` until `(value & mask) == val` or the timeout expires.
    ///
    /// The timeout is in microseconds and is consumed in
    /// [`AH_TIME_QUANTUM_US`] slices.
    pub fn reg_wait(&mut self, reg: u32, mask: u32, val: u32, timeout_us: u32) -> Result<()> {
        for _ in 0..timeout_us / AH_TIME_QUANTUM_US {
            if self.reg_read(reg)? & mask == val {
                return Ok(());
            }
            thread::sleep(Duration::from_micros(u64::from(AH_TIME_QUANTUM_US)));
        }
        Err(Error::ReadTimeout { reg })
    }

    /// Read one 16-bit EEPROM word at the given word offset.
    ///
    /// Issues the read through the EEPROM window, waits for the busy flag
    /// to clear, then latches the data from the status register. The
    /// session's byteswap compensation is applied to the result.
    pub fn eeprom_read(&mut self, off: u32) -> Result<u16> {
        let status_reg = self.eeprom_status_reg();

        let _ = self.reg_read(AR5416_EEPROM_OFFSET + (off << AR5416_EEPROM_S))?;
        self.reg_wait(
            status_reg,
            AR_EEPROM_STATUS_DATA_BUSY | AR_EEPROM_STATUS_DATA_PROT_ACCESS,
            0,
            AH_WAIT_TIMEOUT_US,
        )?;

        let word = (self.reg_read(status_reg)? & AR_EEPROM_STATUS_DATA_VAL) as u16;
        Ok(if self.io_swap {
            word.swap_bytes()
        } else {
            word
        })
    }

    /// Read a run of EEPROM words starting at `off`.
    pub fn eeprom_read_run(&mut self, off: u32, count: usize) -> Result<Vec<u16>> {
        let mut words = Vec::with_capacity(count);
        for i in 0..count {
            words.push(self.eeprom_read(off + i as u32)?);
        }
        Ok(words)
    }

    fn eeprom_status_reg(&self) -> u32 {
        if self.rev.is_9340() {
            AR_EEPROM_STATUS_DATA_9340
        } else if self.rev.is_9300_or_later() {
            AR_EEPROM_STATUS_DATA_9300
        } else {
            AR_EEPROM_STATUS_DATA
        }
    }

    /// Decode the `AR_SREV` register into a [`ChipRevision`].
    ///
    /// Newer chips put `0xFF` in the legacy ID field and carry their
    /// version/revision in the extended fields.
    fn read_revisions(&mut self) -> Result<()> {
        let val = self.reg_read(AR_SREV)? & AR_SREV_ID;

        self.rev = if val == 0xFF {
            let val = self.reg_read(AR_SREV)?;
            ChipRevision {
                mac_version: (val & AR_SREV_VERSION2) >> AR_SREV_TYPE2_S,
                mac_rev: (val & AR_SREV_REVISION2) >> AR_SREV_REVISION2_S,
            }
        } else {
            ChipRevision {
                mac_version: (val & AR_SREV_VERSION) >> AR_SREV_VERSION_S,
                mac_rev: val & AR_SREV_REVISION,
            }
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::srev;

    /// Minimal register-space simulation: a revision register, an EEPROM
    /// word array behind the read-window/status protocol, and an optional
    /// stuck busy flag.
    struct SimRegs {
        srev: u32,
        eeprom: Vec<u16>,
        latched: usize,
        stuck_busy: bool,
    }

    impl SimRegs {
        fn new(srev: u32, eeprom: Vec<u16>) -> Self {
            SimRegs {
                srev,
                eeprom,
                latched: 0,
                stuck_busy: false,
            }
        }
    }

    impl Connector for SimRegs {
        fn reg_read(&mut self, reg: u32) -> Result<u32> {
            match reg {
                AR_SREV => Ok(self.srev),
                AR_EEPROM_STATUS_DATA | AR_EEPROM_STATUS_DATA_9300
                | AR_EEPROM_STATUS_DATA_9340 => {
                    if self.stuck_busy {
                        return Ok(AR_EEPROM_STATUS_DATA_BUSY);
                    }
                    let word = self.eeprom.get(self.latched).copied().unwrap_or(0);
                    Ok(u32::from(word))
                }
                r if r >= AR5416_EEPROM_OFFSET => {
                    self.latched = ((r - AR5416_EEPROM_OFFSET) >> AR5416_EEPROM_S) as usize;
                    Ok(0)
                }
                _ => Ok(0),
            }
        }
    }

    fn new_style_srev(version: u32, rev: u32) -> u32 {
        (version << AR_SREV_TYPE2_S) | (rev << AR_SREV_REVISION2_S) | 0xFF
    }

    #[test]
    fn reads_new_style_revision() {
        let con = SimRegs::new(new_style_srev(srev::AR9285, 2), vec![]);
        let session = Session::new(con).unwrap();
        assert_eq!(session.revision().mac_version, srev::AR9285);
        assert_eq!(session.revision().mac_rev, 2);
    }

    #[test]
    fn reads_legacy_revision() {
        // Legacy layout: version in bits 4..8, revision in bits 0..3.
        let con = SimRegs::new(0x0000_00D2, vec![]);
        let session = Session::new(con).unwrap();
        assert_eq!(session.revision().mac_version, 0xD);
        assert_eq!(session.revision().mac_rev, 2);
    }

    #[test]
    fn eeprom_read_applies_swap() {
        let con = SimRegs::new(new_style_srev(srev::AR9280, 0), vec![0xA55A, 0x1234]);
        let mut session = Session::new(con).unwrap();
        assert_eq!(session.eeprom_read(0).unwrap(), 0xA55A);
        session.toggle_io_swap();
        assert_eq!(session.eeprom_read(0).unwrap(), 0x5AA5);
        assert_eq!(session.eeprom_read(1).unwrap(), 0x3412);
    }

    #[test]
    fn stuck_busy_flag_times_out() {
        let mut con = SimRegs::new(new_style_srev(srev::AR9280, 0), vec![0xA55A]);
        con.stuck_busy = true;
        let mut session = Session::new(con).unwrap();
        match session.reg_wait(
            AR_EEPROM_STATUS_DATA,
            AR_EEPROM_STATUS_DATA_BUSY,
            0,
            1_000,
        ) {
            Err(Error::ReadTimeout { reg }) => assert_eq!(reg, AR_EEPROM_STATUS_DATA),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
