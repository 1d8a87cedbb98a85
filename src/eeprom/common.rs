//! Logic shared by every EEPROM generation: byte-order resolution, the
//! XOR checksum, sentinel-terminated record parsing, and the text
//! formatters for headers, target-power tables and CTL tables.

use std::fmt::{self, Write};

use log::{debug, warn};

use crate::connector::Connector;
use crate::constants::*;
use crate::error::Result;
use crate::session::Session;

// ---- Fixed name tables ----

pub(crate) const DEVICE_TYPES: [&str; 8] = [
    "UNKNOWN [0] ",
    "Cardbus     ",
    "PCI         ",
    "MiniPCI     ",
    "Access Point",
    "PCIExpress  ",
    "UNKNOWN [6] ",
    "UNKNOWN [7] ",
];

pub(crate) const ACCESS_TYPES: [&str; 4] = ["ReadWrite", "WriteOnly", "ReadOnly", "NoAccess"];

/// Legacy CCK rate labels (4 target-power rates).
pub(crate) const RATES_CCK: [&str; 4] = ["1 mbps", "2 mbps", "5.5 mbps", "11 mbps"];

/// Legacy OFDM rate labels (4 target-power rates).
pub(crate) const RATES_OFDM: [&str; 4] = ["6-24 mbps", "36 mbps", "48 mbps", "54 mbps"];

/// HT rate labels (8 target-power rates).
pub(crate) const RATES_HT: [&str; 8] = [
    "MCS 0/8", "MCS 1/9", "MCS 2/10", "MCS 3/11", "MCS 4/12", "MCS 5/13", "MCS 6/14", "MCS 7/15",
];

pub(crate) const CTL_DOMAINS: [&str; 16] = [
    "Unknown (0)",
    "FCC",
    "Unknown (2)",
    "ETSI",
    "MKK",
    "Unknown (5)",
    "Unknown (6)",
    "Unknown (7)",
    "Unknown (8)",
    "Unknown (9)",
    "Unknown (10)",
    "Unknown (11)",
    "Unknown (12)",
    "Unknown (13)",
    "SD no ctl",
    "No ctl",
];

pub(crate) const CTL_MODES: [&str; 16] = [
    "5GHz OFDM",
    "2GHz CCK",
    "2GHz OFDM",
    "5GHz Turbo",
    "2GHz Turbo",
    "2GHz HT20",
    "5GHz HT20",
    "2GHz HT40",
    "5GHz HT40",
    "Unknown (9)",
    "Unknown (10)",
    "Unknown (11)",
    "Unknown (12)",
    "Unknown (13)",
    "Unknown (14)",
    "Unknown (15)",
];

/// Widest per-record rate count across all generations.
pub(crate) const MAX_TARGET_RATES: usize = 14;

// ---- Checksum and bin mapping ----

/// XOR-fold a word region.
///
/// The stored checksum field is constructed as the XOR of every other word
/// in the region, so a conformant image folds to zero.
pub fn calc_csum(words: &[u16]) -> u16 {
    words.iter().fold(0, |csum, &w| csum ^ w)
}

/// Map a channel bin to its frequency in MHz.
///
/// The 2.4 GHz band stores the offset from 2300 MHz directly; the 5 GHz
/// band stores it in 5 MHz steps from 4800 MHz.
pub fn fbin2freq(bin: u8, is_2g: bool) -> u16 {
    if is_2g {
        2300 + u16::from(bin)
    } else {
        4800 + 5 * u16::from(bin)
    }
}

/// Half-dB power portion of a packed CTL edge byte.
#[inline]
pub fn ctl_edge_power(ctl: u8) -> u8 {
    ctl & 0x3F
}

/// Flag bits of a packed CTL edge byte.
#[inline]
pub fn ctl_edge_flags(ctl: u8) -> u8 {
    (ctl >> 6) & 0x3
}

/// Error for dump/check entry points invoked before `fill`.
pub(crate) fn not_filled() -> crate::error::Error {
    crate::error::Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "EEPROM image not loaded",
    ))
}

// ---- Byte-order resolution ----

/// Word offset of the {opCapFlags, eepMisc} pair within a classic header.
pub(crate) const BASE_EEPMISC_WORD: u32 = 3;
/// Word offset of the low calibration-build word within a classic header.
pub(crate) const BASE_BINBUILD_WORD: u32 = 13;

/// Detect EEPROM I/O byteswapping and toggle the session's compensation if
/// needed, so that all subsequent word reads decode consistently.
///
/// Runs exactly once per session, before any structured read. All offsets
/// are in 16-bit words.
pub(crate) fn toggle_byteswap<C: Connector>(
    session: &mut Session<C>,
    eepmisc_off: u32,
    binbuildnum_off: u32,
) -> Result<()> {
    // First learn whether the magic looks little-endian or not.
    let word = session.eeprom_read(AR5416_EEPROM_MAGIC_OFFSET)?;
    let magic_is_be = word != AR5416_EEPROM_MAGIC;

    // The {opCapFlags, eepMisc} pair shares one word. Bit 0 of the low
    // octet is the 5 GHz capability, bit 0 of the high octet marks
    // big-endian EEPROM data. A byteswap exchanges the two, so only the
    // both-set and both-clear cases identify the data format outright;
    // with the format known, a magic mismatch indicates the I/O swap.
    let word = session.eeprom_read(eepmisc_off)? & 0x0101;
    match word {
        0x0000 => {
            // Clearly little-endian EEPROM data.
            if magic_is_be {
                debug!("got byteswapped little-endian EEPROM data");
                session.toggle_io_swap();
            }
            return Ok(());
        }
        0x0101 => {
            // Clearly big-endian EEPROM data.
            if !magic_is_be {
                debug!("got byteswapped big-endian EEPROM data");
                session.toggle_io_swap();
            }
            return Ok(());
        }
        _ => debug!("EEPROM data is possibly byteswapped"),
    }

    // Exactly one bit set: fall back to the calibration-software build
    // number. Its low 16-bit word always has a non-zero low octet and a
    // zero high octet when correctly oriented.
    let word = session.eeprom_read(binbuildnum_off)?;
    if (word & 0xFF00) != 0 && (word & 0x00FF) == 0 {
        debug!("calibration build number is byteswapped");
        session.toggle_io_swap();
    } else if (word & 0xFF00) == 0 && (word & 0x00FF) != 0 {
        debug!("looks like there is no byteswapping");
    } else {
        // Some weird build number; no decisive signal left.
        warn!("unable to detect byteswap, preferring little-endian data (heuristic tie-break)");
        if magic_is_be {
            session.toggle_io_swap();
        }
    }

    Ok(())
}

// ---- Raw image access ----

/// Byte-granular reader over a 16-bit word buffer.
///
/// Words hold their low byte first, so byte `i` lives in the low or high
/// octet of word `i / 2`. Multi-byte fields are little-endian and need not
/// be word-aligned.
pub(crate) struct WordReader<'a> {
    words: &'a [u16],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub(crate) fn new(words: &'a [u16]) -> Self {
        WordReader { words, pos: 0 }
    }

    pub(crate) fn seek(&mut self, byte_off: usize) {
        self.pos = byte_off;
    }

    pub(crate) fn skip(&mut self, n: usize) {
        self.pos += n;
    }

    fn byte_at(&self, i: usize) -> u8 {
        let w = self.words[i / 2];
        if i % 2 == 0 {
            (w & 0xFF) as u8
        } else {
            (w >> 8) as u8
        }
    }

    pub(crate) fn u8(&mut self) -> u8 {
        let b = self.byte_at(self.pos);
        self.pos += 1;
        b
    }

    pub(crate) fn i8(&mut self) -> i8 {
        self.u8() as i8
    }

    pub(crate) fn u16(&mut self) -> u16 {
        u16::from(self.u8()) | u16::from(self.u8()) << 8
    }

    pub(crate) fn u32(&mut self) -> u32 {
        u32::from(self.u16()) | u32::from(self.u16()) << 16
    }

    pub(crate) fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        for b in &mut out {
            *b = self.u8();
        }
        out
    }
}

// ---- Shared header records ----

/// The classic base header carried by all pre-QCA layouts.
#[derive(Debug, Clone, Default)]
pub(crate) struct BaseHeader {
    pub length: u16,
    pub checksum: u16,
    pub version: u16,
    pub op_cap_flags: u8,
    pub eep_misc: u8,
    pub reg_dmn: [u16; 2],
    pub mac_addr: [u8; 6],
    pub rx_mask: u8,
    pub tx_mask: u8,
    pub rf_silent: u16,
    pub blue_tooth_options: u16,
    pub device_cap: u16,
    pub bin_build_number: u32,
    pub device_type: u8,
}

/// Parsed size of [`BaseHeader`], including the trailing reserved byte.
pub(crate) const BASE_HEADER_BYTES: usize = 32;

impl BaseHeader {
    pub(crate) fn parse(r: &mut WordReader) -> Self {
        let base = BaseHeader {
            length: r.u16(),
            checksum: r.u16(),
            version: r.u16(),
            op_cap_flags: r.u8(),
            eep_misc: r.u8(),
            reg_dmn: [r.u16(), r.u16()],
            mac_addr: r.bytes(),
            rx_mask: r.u8(),
            tx_mask: r.u8(),
            rf_silent: r.u16(),
            blue_tooth_options: r.u16(),
            device_cap: r.u16(),
            bin_build_number: r.u32(),
            device_type: r.u8(),
        };
        r.skip(1); // reserved
        base
    }

    /// Version major nibble; [`AR5416_EEP_VER_MAJOR`] on conformant images.
    pub(crate) fn version_major(&self) -> u16 {
        self.version >> 12
    }

    pub(crate) fn version_minor(&self) -> u16 {
        self.version & 0x0FFF
    }
}

/// Register-initialization record from the init region.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InitReg {
    pub addr: u16,
    pub val_low: u16,
    pub val_high: u16,
}

/// The init region preceding the calibration structure: magic word,
/// access-protection field, init-data pointer and the register records.
#[derive(Debug, Clone, Default)]
pub(crate) struct EepInit {
    pub magic: u16,
    pub prot: u16,
    pub iptr: u16,
    pub regs: Vec<InitReg>,
}

impl EepInit {
    /// Parse the init region from its raw words. The record list ends at
    /// the `0xFFFF` terminator address or at the end of the region.
    pub(crate) fn parse(words: &[u16]) -> Self {
        let mut regs = Vec::new();
        let mut i = 3;
        while i + 2 < words.len() {
            if words[i] == AR5416_EEP_INIT_REG_END {
                break;
            }
            regs.push(InitReg {
                addr: words[i],
                val_low: words[i + 1],
                val_high: words[i + 2],
            });
            i += 3;
        }

        EepInit {
            magic: words[0],
            prot: words[1],
            iptr: words[2],
            regs,
        }
    }
}

// ---- Parsed table records ----

/// One per-channel target-power record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TargetPower {
    pub bchannel: u8,
    pub tpow2x: [u8; MAX_TARGET_RATES],
}

/// Walk a run of `maxchans` fixed-stride target-power records and keep
/// those before the `0xFF` sentinel bin.
///
/// The full capacity is always consumed from the reader so that the
/// following fields keep their layout offsets.
pub(crate) fn parse_target_powers(
    r: &mut WordReader,
    maxchans: usize,
    nrates: usize,
) -> Vec<TargetPower> {
    let mut out = Vec::with_capacity(maxchans);
    let mut terminated = false;

    for _ in 0..maxchans {
        let bchannel = r.u8();
        let mut tpow2x = [0u8; MAX_TARGET_RATES];
        for p in tpow2x.iter_mut().take(nrates) {
            *p = r.u8();
        }
        if bchannel == AR5416_BCHAN_UNUSED {
            terminated = true;
        }
        if !terminated {
            out.push(TargetPower { bchannel, tpow2x });
        }
    }

    out
}

/// One CTL band edge: channel bin plus the packed power/flag byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CtlEdge {
    pub bchannel: u8,
    pub ctl: u8,
}

/// Read the full CTL edge storage: `nctls` entries of
/// `nchains * nedges` (bin, ctl) pairs each.
pub(crate) fn parse_ctl_data(
    r: &mut WordReader,
    nctls: usize,
    nchains: usize,
    nedges: usize,
) -> Vec<Vec<CtlEdge>> {
    (0..nctls)
        .map(|_| {
            (0..nchains * nedges)
                .map(|_| CtlEdge {
                    bchannel: r.u8(),
                    ctl: r.u8(),
                })
                .collect()
        })
        .collect()
}

// ---- Formatting ----

/// Write a boxed section banner.
pub(crate) fn write_sect_name(w: &mut dyn Write, name: &str) -> fmt::Result {
    let width = name.len().max(20) + 2;
    writeln!(w)?;
    writeln!(w, ".{:-<width$}.", "")?;
    writeln!(w, "| {:width2$} |", name, width2 = width - 2)?;
    writeln!(w, "'{:-<width$}'", "")?;
    writeln!(w)
}

/// Write a subsection heading.
pub(crate) fn write_subsect_name(w: &mut dyn Write, name: &str) -> fmt::Result {
    writeln!(w, "{name}:")?;
    writeln!(w)
}

/// Dump the init region: magic, per-region access modes, init pointer and
/// the register-initialization records.
pub(crate) fn dump_eep_init(w: &mut dyn Write, ini: &EepInit) -> fmt::Result {
    writeln!(w, "{:<20} : 0x{:04X}", "Magic", ini.magic)?;
    for i in 0..8 {
        writeln!(
            w,
            "Region{i} access       : {}",
            ACCESS_TYPES[((ini.prot >> (i * 2)) & 0x3) as usize]
        )?;
    }
    writeln!(w, "{:<20} : 0x{:04X}", "Regs init data ptr", ini.iptr)?;
    writeln!(w)?;

    write_subsect_name(w, "Register(s) initialization data")?;
    for reg in &ini.regs {
        writeln!(w, "  {:04X}: {:04X}{:04X}", reg.addr, reg.val_high, reg.val_low)?;
    }
    writeln!(w)
}

/// Dump the rows common to every classic base header.
pub(crate) fn dump_base_header(w: &mut dyn Write, base: &BaseHeader) -> fmt::Result {
    let opflag = |mask: u8| u8::from(base.op_cap_flags & mask != 0);

    writeln!(w, "{:<30} : {}", "Major Version", base.version_major())?;
    writeln!(w, "{:<30} : {}", "Minor Version", base.version_minor())?;
    writeln!(w, "{:<30} : 0x{:04X}", "Checksum", base.checksum)?;
    writeln!(w, "{:<30} : 0x{:04X}", "Length", base.length)?;
    writeln!(w, "{:<30} : 0x{:04X}", "RegDomain1", base.reg_dmn[0])?;
    writeln!(w, "{:<30} : 0x{:04X}", "RegDomain2", base.reg_dmn[1])?;
    writeln!(w, "{:<30} : 0x{:02X}", "TX Mask", base.tx_mask)?;
    writeln!(w, "{:<30} : 0x{:02X}", "RX Mask", base.rx_mask)?;
    writeln!(w, "{:<30} : {}", "Allow 5GHz", opflag(AR5416_OPFLAGS_11A))?;
    writeln!(w, "{:<30} : {}", "Allow 2GHz", opflag(AR5416_OPFLAGS_11G))?;
    writeln!(
        w,
        "{:<30} : {}",
        "Disable 2GHz HT20",
        opflag(AR5416_OPFLAGS_N_2G_HT20)
    )?;
    writeln!(
        w,
        "{:<30} : {}",
        "Disable 2GHz HT40",
        opflag(AR5416_OPFLAGS_N_2G_HT40)
    )?;
    writeln!(
        w,
        "{:<30} : {}",
        "Disable 5GHz HT20",
        opflag(AR5416_OPFLAGS_N_5G_HT20)
    )?;
    writeln!(
        w,
        "{:<30} : {}",
        "Disable 5GHz HT40",
        opflag(AR5416_OPFLAGS_N_5G_HT40)
    )?;
    writeln!(
        w,
        "{:<30} : {}",
        "Big Endian",
        u8::from(base.eep_misc & AR5416_EEPMISC_BIG_ENDIAN != 0)
    )?;
    writeln!(w, "{:<30} : 0x{:04X}", "RF Silent", base.rf_silent)?;
    writeln!(
        w,
        "{:<30} : 0x{:04X}",
        "Bluetooth options", base.blue_tooth_options
    )?;
    writeln!(w, "{:<30} : 0x{:04X}", "Device Capabilities", base.device_cap)?;
    writeln!(
        w,
        "{:<30} : {}.{}.{}",
        "Cal Bin Version",
        (base.bin_build_number >> 24) & 0xFF,
        (base.bin_build_number >> 16) & 0xFF,
        base.bin_build_number & 0xFF
    )?;
    writeln!(
        w,
        "{:<30} : {}",
        "Device Type",
        DEVICE_TYPES[(base.device_type & 0x7) as usize]
    )?;
    writeln!(w, "{:<30} : {}", "MacAddress", format_mac(&base.mac_addr))
}

pub(crate) fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Dump a target-power table as a channel-columned matrix.
pub(crate) fn dump_target_power(
    w: &mut dyn Write,
    caldata: &[TargetPower],
    nrates: usize,
    rates: &[&str],
    is_2g: bool,
) -> fmt::Result {
    write!(w, "    {:>10}, MHz:", "Freq")?;
    for tp in caldata {
        write!(w, "  {:4}", fbin2freq(tp.bchannel, is_2g))?;
    }
    writeln!(w)?;

    write!(w, "    ----------------")?;
    for _ in caldata {
        write!(w, "  ----")?;
    }
    writeln!(w)?;

    for (i, rate) in rates.iter().enumerate().take(nrates) {
        write!(w, "    {rate:>10}, dBm:")?;
        for tp in caldata {
            write!(w, "  {:4.1}", f64::from(tp.tpow2x[i]) / 2.0)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

/// Dump the edge lists of one CTL entry, one row pair per radio chain.
///
/// Unflagged edges delimit contiguous allowed sub-bands: each one toggles
/// the bracket state, opening before its frequency or closing after it.
pub(crate) fn dump_ctl_edges(
    w: &mut dyn Write,
    edges: &[CtlEdge],
    maxradios: usize,
    maxedges: usize,
    is_2g: bool,
) -> fmt::Result {
    for rnum in 0..maxradios {
        writeln!(w)?;
        if maxradios > 1 {
            writeln!(w, "    {} radio(s) Tx:", rnum + 1)?;
        }

        write!(w, "           Edges, MHz:")?;
        let mut open = true;
        for e in edges.iter().skip(rnum * maxedges).take(maxedges) {
            if e.bchannel == 0 {
                break;
            }
            let unflagged = ctl_edge_flags(e.ctl) == 0;
            write!(
                w,
                " {}{:4}{}",
                if unflagged && open { '[' } else { ' ' },
                fbin2freq(e.bchannel, is_2g),
                if unflagged && !open { ']' } else { ' ' },
            )?;
            if unflagged {
                open = !open;
            }
        }
        writeln!(w)?;

        write!(w, "      MaxTxPower, dBm:")?;
        for e in edges.iter().skip(rnum * maxedges).take(maxedges) {
            if e.bchannel == 0 {
                break;
            }
            write!(w, "  {:4.1} ", f64::from(ctl_edge_power(e.ctl)) / 2.0)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

/// Dump all CTL entries: domain/mode heading plus the edge lists.
pub(crate) fn dump_ctl(
    w: &mut dyn Write,
    index: &[u8],
    data: &[Vec<CtlEdge>],
    maxradios: usize,
    maxedges: usize,
) -> fmt::Result {
    for (i, &ctl) in index.iter().enumerate() {
        if ctl == 0 {
            break;
        }
        let mode = CTL_MODES[(ctl & 0x0F) as usize];
        writeln!(w, "  {} {}:", CTL_DOMAINS[(ctl >> 4) as usize], mode)?;
        dump_ctl_edges(w, &data[i], maxradios, maxedges, mode.starts_with('2'))?;
        writeln!(w)?;
    }

    Ok(())
}
