//! The QCA6174 EEPROM layout.
//!
//! Only the base header of this 8124-byte image is understood; the rest
//! of the calibration data is undocumented. The layout carries no magic
//! word or endianness flags, so byte order is resolved from the declared
//! length field instead of the usual magic heuristic.

use std::fmt::Write;

use log::debug;

use super::common::{self, WordReader};
use super::EepromOps;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::session::Session;

/// Total image size in bytes.
pub const IMAGE_BYTES: usize = 8124;
/// Total image size in words.
pub const IMAGE_WORDS: usize = IMAGE_BYTES / 2;

/// Customer data bytes in the base header.
pub const CUST_DATA_BYTES: usize = 20;

const BASE_HEADER_BYTES: usize = 64;
const OFF_CUST_DATA: usize = 44;

/// QCA6174 base header.
#[derive(Debug, Clone, Default)]
struct BaseHeader {
    length: u16,
    checksum: u16,
    eeprom_version: u8,
    template_version: u8,
    mac_addr: [u8; 6],
}

impl BaseHeader {
    fn parse(r: &mut WordReader) -> Self {
        BaseHeader {
            length: r.u16(),
            checksum: r.u16(),
            eeprom_version: r.u8(),
            template_version: r.u8(),
            mac_addr: r.bytes(),
        }
    }
}

/// Extractor for the QCA6174 layout.
#[derive(Default)]
pub struct Eep6174 {
    words: Vec<u16>,
    base: BaseHeader,
    cust_data: Vec<u8>,
}

impl Eep6174 {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(&mut self) {
        let mut r = WordReader::new(&self.words);
        self.base = BaseHeader::parse(&mut r);
        r.seek(OFF_CUST_DATA);
        self.cust_data = (0..CUST_DATA_BYTES).map(|_| r.u8()).collect();
    }
}

impl<C: Connector> EepromOps<C> for Eep6174 {
    fn fill(&mut self, session: &mut Session<C>) -> Result<()> {
        // No magic word in this layout: probe the declared length to
        // detect I/O byteswapping before loading the image.
        let length = session.eeprom_read(0)?;
        if length != IMAGE_BYTES as u16 && length.swap_bytes() == IMAGE_BYTES as u16 {
            debug!("got byteswapped EEPROM data");
            session.toggle_io_swap();
        }

        self.words = session.eeprom_read_run(0, IMAGE_WORDS)?;
        self.parse();
        Ok(())
    }

    fn check(&mut self) -> Result<()> {
        if self.words.len() != IMAGE_WORDS {
            return Err(common::not_filled());
        }

        let length = self.base.length;
        if length as usize != IMAGE_BYTES {
            return Err(Error::BadLength { length });
        }

        let sum = common::calc_csum(&self.words[..length as usize / 2]);
        if sum != 0 {
            return Err(Error::ChecksumMismatch { sum });
        }

        Ok(())
    }

    fn dump_base_header(&self, w: &mut dyn Write) -> Result<()> {
        common::write_sect_name(w, "EEPROM Base Header")?;

        writeln!(w, "{:<30} : 0x{:04X}", "Length", self.base.length)?;
        writeln!(w, "{:<30} : 0x{:04X}", "Checksum", self.base.checksum)?;
        writeln!(w, "{:<30} : {}", "EEPROM Version", self.base.eeprom_version)?;
        writeln!(
            w,
            "{:<30} : {}",
            "Template Version", self.base.template_version
        )?;
        writeln!(
            w,
            "{:<30} : {}",
            "MacAddress",
            common::format_mac(&self.base.mac_addr)
        )?;
        writeln!(w)?;

        common::write_subsect_name(w, "Customer Data in hex")?;
        for chunk in self.cust_data.chunks(16) {
            write!(w, " ")?;
            for b in chunk {
                write!(w, " {b:02X}")?;
            }
            writeln!(w)?;
        }
        writeln!(w)?;
        Ok(())
    }

    fn dump_modal_header(&self, _w: &mut dyn Write) -> Result<()> {
        // The modal data of this layout is undocumented.
        Ok(())
    }

    fn dump_power_info(&self, _w: &mut dyn Write) -> Result<()> {
        // The power calibration data of this layout is undocumented.
        Ok(())
    }
}
