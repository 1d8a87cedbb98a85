//! The AR9300-or-later EEPROM layout.
//!
//! Unlike the older generations this layout keeps channel bins and power
//! values in *separate* arrays, widens the HT target-power records to 14
//! rates, and packs each CTL edge power into a single 6+2-bit byte with
//! its channel bin held in a parallel freqbin array.

use std::fmt::{self, Write};

use super::common::{
    self, BaseHeader, CtlEdge, TargetPower, WordReader, BASE_BINBUILD_WORD, BASE_EEPMISC_WORD,
    BASE_HEADER_BYTES, MAX_TARGET_RATES, RATES_CCK, RATES_OFDM,
};
use super::EepromOps;
use crate::connector::Connector;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::session::Session;

/// Word offset of the calibration structure within the EEPROM.
pub const EEP_START_LOC: usize = 0x40;

/// RF chains (calibration piers only; CTL data is single-row here).
pub const MAX_CHAINS: usize = 3;
/// 2.4 GHz CTL entries.
pub const NUM_CTLS_2G: usize = 12;
/// Band edges per 2.4 GHz CTL entry.
pub const NUM_BAND_EDGES_2G: usize = 4;
/// 5 GHz CTL entries.
pub const NUM_CTLS_5G: usize = 9;
/// Band edges per 5 GHz CTL entry.
pub const NUM_BAND_EDGES_5G: usize = 8;

/// Target-power channels: CCK.
pub const NUM_TARGET_CHANS_CCK: usize = 2;
/// Target-power channels: 2.4 GHz legacy and HT.
pub const NUM_TARGET_CHANS_2G: usize = 3;
/// Target-power channels: 5 GHz legacy and HT.
pub const NUM_TARGET_CHANS_5G: usize = 8;

/// HT target-power rates in this generation.
pub const NUM_HT_RATES: usize = 14;

/// HT rate labels (grouped MCS indices, 14 target-power rates).
pub(crate) const RATES_HT_9003: [&str; NUM_HT_RATES] = [
    "MCS 0/8/16",
    "MCS 1-3/9-11/17-19",
    "MCS 4",
    "MCS 5",
    "MCS 6",
    "MCS 7",
    "MCS 12",
    "MCS 13",
    "MCS 14",
    "MCS 15",
    "MCS 20",
    "MCS 21",
    "MCS 22",
    "MCS 23",
];

const NUM_CAL_PIERS_2G: usize = 3;
const NUM_CAL_PIERS_5G: usize = 8;
// refPower plus temperature/voltage/noise-floor measurements per pier.
const PIER_DATA_BYTES: usize = 6;

const BASE_EXT_BYTES: usize = 4;
const CUST_DATA_BYTES: usize = 20;
const MODAL_BYTES: usize = 32;

// Byte offsets within the calibration structure.
const OFF_CUST_DATA: usize = BASE_HEADER_BYTES + BASE_EXT_BYTES;
const OFF_MODAL_2G: usize = OFF_CUST_DATA + CUST_DATA_BYTES;
const OFF_CAL_FREQ_PIER_2G: usize = OFF_MODAL_2G + MODAL_BYTES;
const OFF_CAL_PIER_DATA_2G: usize = OFF_CAL_FREQ_PIER_2G + NUM_CAL_PIERS_2G;
/// Byte offset of the CCK target-power freqbin array.
pub const OFF_TP_FREQ_CCK: usize =
    OFF_CAL_PIER_DATA_2G + MAX_CHAINS * NUM_CAL_PIERS_2G * PIER_DATA_BYTES;
/// Byte offset of the 2.4 GHz legacy target-power freqbin array.
pub const OFF_TP_FREQ_2G: usize = OFF_TP_FREQ_CCK + NUM_TARGET_CHANS_CCK;
/// Byte offset of the 2.4 GHz HT20 target-power freqbin array.
pub const OFF_TP_FREQ_2G_HT20: usize = OFF_TP_FREQ_2G + NUM_TARGET_CHANS_2G;
/// Byte offset of the 2.4 GHz HT40 target-power freqbin array.
pub const OFF_TP_FREQ_2G_HT40: usize = OFF_TP_FREQ_2G_HT20 + NUM_TARGET_CHANS_2G;
/// Byte offset of the CCK target-power values.
pub const OFF_TP_CCK: usize = OFF_TP_FREQ_2G_HT40 + NUM_TARGET_CHANS_2G;
/// Byte offset of the 2.4 GHz legacy target-power values.
pub const OFF_TP_2G: usize = OFF_TP_CCK + NUM_TARGET_CHANS_CCK * 4;
/// Byte offset of the 2.4 GHz HT20 target-power values.
pub const OFF_TP_2G_HT20: usize = OFF_TP_2G + NUM_TARGET_CHANS_2G * 4;
/// Byte offset of the 2.4 GHz HT40 target-power values.
pub const OFF_TP_2G_HT40: usize = OFF_TP_2G_HT20 + NUM_TARGET_CHANS_2G * NUM_HT_RATES;
/// Byte offset of the 2.4 GHz CTL index.
pub const OFF_CTL_INDEX_2G: usize = OFF_TP_2G_HT40 + NUM_TARGET_CHANS_2G * NUM_HT_RATES;
/// Byte offset of the 2.4 GHz CTL freqbin arrays.
pub const OFF_CTL_FREQ_2G: usize = OFF_CTL_INDEX_2G + NUM_CTLS_2G;
/// Byte offset of the 2.4 GHz CTL packed power bytes.
pub const OFF_CTL_DATA_2G: usize = OFF_CTL_FREQ_2G + NUM_CTLS_2G * NUM_BAND_EDGES_2G;

const OFF_MODAL_5G: usize = OFF_CTL_DATA_2G + NUM_CTLS_2G * NUM_BAND_EDGES_2G;
const OFF_CAL_FREQ_PIER_5G: usize = OFF_MODAL_5G + MODAL_BYTES;
const OFF_CAL_PIER_DATA_5G: usize = OFF_CAL_FREQ_PIER_5G + NUM_CAL_PIERS_5G;
/// Byte offset of the 5 GHz legacy target-power freqbin array.
pub const OFF_TP_FREQ_5G: usize =
    OFF_CAL_PIER_DATA_5G + MAX_CHAINS * NUM_CAL_PIERS_5G * PIER_DATA_BYTES;
/// Byte offset of the 5 GHz HT20 target-power freqbin array.
pub const OFF_TP_FREQ_5G_HT20: usize = OFF_TP_FREQ_5G + NUM_TARGET_CHANS_5G;
/// Byte offset of the 5 GHz HT40 target-power freqbin array.
pub const OFF_TP_FREQ_5G_HT40: usize = OFF_TP_FREQ_5G_HT20 + NUM_TARGET_CHANS_5G;
/// Byte offset of the 5 GHz legacy target-power values.
pub const OFF_TP_5G: usize = OFF_TP_FREQ_5G_HT40 + NUM_TARGET_CHANS_5G;
/// Byte offset of the 5 GHz HT20 target-power values.
pub const OFF_TP_5G_HT20: usize = OFF_TP_5G + NUM_TARGET_CHANS_5G * 4;
/// Byte offset of the 5 GHz HT40 target-power values.
pub const OFF_TP_5G_HT40: usize = OFF_TP_5G_HT20 + NUM_TARGET_CHANS_5G * NUM_HT_RATES;
/// Byte offset of the 5 GHz CTL index (one pad byte follows the index).
pub const OFF_CTL_INDEX_5G: usize = OFF_TP_5G_HT40 + NUM_TARGET_CHANS_5G * NUM_HT_RATES;
/// Byte offset of the 5 GHz CTL freqbin arrays.
pub const OFF_CTL_FREQ_5G: usize = OFF_CTL_INDEX_5G + NUM_CTLS_5G + 1;
/// Byte offset of the 5 GHz CTL packed power bytes.
pub const OFF_CTL_DATA_5G: usize = OFF_CTL_FREQ_5G + NUM_CTLS_5G * NUM_BAND_EDGES_5G;

/// Size of the calibration structure in bytes (padded to a word).
pub const EEP_BYTES: usize = OFF_CTL_DATA_5G + NUM_CTLS_5G * NUM_BAND_EDGES_5G + 2;
/// Size of the calibration structure in words.
pub const EEP_WORDS: usize = EEP_BYTES / 2;
/// Total image size in words.
pub const IMAGE_WORDS: usize = EEP_START_LOC + EEP_WORDS;

/// AR9003-specific base header tail.
#[derive(Debug, Clone, Default)]
struct BaseExt {
    template_version: u8,
    power_table_offset: i8,
    tuning_caps: [u8; 2],
}

/// Per-band modal header.
#[derive(Debug, Clone, Default)]
struct ModalHeader {
    ant_ctrl_common: u32,
    ant_ctrl_common2: u32,
    ant_ctrl_chain: [u16; MAX_CHAINS],
    xatten1_db: [u8; MAX_CHAINS],
    xatten1_margin: [u8; MAX_CHAINS],
    temp_slope: i8,
    volt_slope: i8,
    spur_chans: [u8; 5],
    noise_floor_thresh_ch: [i8; MAX_CHAINS],
}

impl ModalHeader {
    fn parse(r: &mut WordReader) -> Self {
        let hdr = ModalHeader {
            ant_ctrl_common: r.u32(),
            ant_ctrl_common2: r.u32(),
            ant_ctrl_chain: [r.u16(), r.u16(), r.u16()],
            xatten1_db: [r.u8(), r.u8(), r.u8()],
            xatten1_margin: [r.u8(), r.u8(), r.u8()],
            temp_slope: r.i8(),
            volt_slope: r.i8(),
            spur_chans: r.bytes(),
            noise_floor_thresh_ch: [r.i8(), r.i8(), r.i8()],
        };
        r.skip(2); // reserved
        hdr
    }

    fn dump(&self, w: &mut dyn Write) -> fmt::Result {
        writeln!(w, "{:<20} : 0x{:08X}", "Ant Ctrl Common", self.ant_ctrl_common)?;
        writeln!(
            w,
            "{:<20} : 0x{:08X}",
            "Ant Ctrl Common2", self.ant_ctrl_common2
        )?;
        writeln!(
            w,
            "{:<20} : 0x{:04X} / 0x{:04X} / 0x{:04X}",
            "Ant Ctrl Chain",
            self.ant_ctrl_chain[0],
            self.ant_ctrl_chain[1],
            self.ant_ctrl_chain[2]
        )?;
        writeln!(
            w,
            "{:<20} : {} / {} / {}",
            "xAtten1 dB", self.xatten1_db[0], self.xatten1_db[1], self.xatten1_db[2]
        )?;
        writeln!(
            w,
            "{:<20} : {} / {} / {}",
            "xAtten1 Margin",
            self.xatten1_margin[0],
            self.xatten1_margin[1],
            self.xatten1_margin[2]
        )?;
        writeln!(w, "{:<20} : {}", "Temp Slope", self.temp_slope)?;
        writeln!(w, "{:<20} : {}", "Volt Slope", self.volt_slope)?;
        writeln!(
            w,
            "{:<20} : {} / {} / {}",
            "NF Thresh",
            self.noise_floor_thresh_ch[0],
            self.noise_floor_thresh_ch[1],
            self.noise_floor_thresh_ch[2]
        )?;
        for (i, &spur) in self.spur_chans.iter().enumerate() {
            if spur == 0 || spur == 0xFF {
                continue;
            }
            writeln!(w, "Spur Channel {i}       : 0x{spur:02X}")?;
        }
        Ok(())
    }
}

/// Extractor for the AR9300-or-later layout.
#[derive(Default)]
pub struct Eep9003 {
    words: Vec<u16>,
    base: BaseHeader,
    base_ext: BaseExt,
    cust_data: Vec<u8>,
    modal_2g: ModalHeader,
    modal_5g: ModalHeader,
    cal_tp_cck: Vec<TargetPower>,
    cal_tp_2g: Vec<TargetPower>,
    cal_tp_2g_ht20: Vec<TargetPower>,
    cal_tp_2g_ht40: Vec<TargetPower>,
    cal_tp_5g: Vec<TargetPower>,
    cal_tp_5g_ht20: Vec<TargetPower>,
    cal_tp_5g_ht40: Vec<TargetPower>,
    ctl_index_2g: Vec<u8>,
    ctl_data_2g: Vec<Vec<CtlEdge>>,
    ctl_index_5g: Vec<u8>,
    ctl_data_5g: Vec<Vec<CtlEdge>>,
}

/// Read a split target-power table: a freqbin array at `off_freq` and the
/// per-channel rate records at `off_pow`.
fn parse_split_target_powers(
    r: &mut WordReader,
    off_freq: usize,
    off_pow: usize,
    maxchans: usize,
    nrates: usize,
) -> Vec<TargetPower> {
    r.seek(off_freq);
    let freqs: Vec<u8> = (0..maxchans).map(|_| r.u8()).collect();

    r.seek(off_pow);
    let mut out = Vec::with_capacity(maxchans);
    let mut terminated = false;
    for &bchannel in &freqs {
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

/// Read a split CTL block: freqbin arrays at `off_freq`, packed power
/// bytes at `off_pow`, `nedges` entries per CTL.
fn parse_split_ctl(
    r: &mut WordReader,
    off_freq: usize,
    off_pow: usize,
    nctls: usize,
    nedges: usize,
) -> Vec<Vec<CtlEdge>> {
    r.seek(off_freq);
    let freqs: Vec<u8> = (0..nctls * nedges).map(|_| r.u8()).collect();
    r.seek(off_pow);
    let pows: Vec<u8> = (0..nctls * nedges).map(|_| r.u8()).collect();

    (0..nctls)
        .map(|i| {
            (0..nedges)
                .map(|e| CtlEdge {
                    bchannel: freqs[i * nedges + e],
                    ctl: pows[i * nedges + e],
                })
                .collect()
        })
        .collect()
}

impl Eep9003 {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(&mut self) {
        let mut r = WordReader::new(&self.words[EEP_START_LOC..]);
        self.base = BaseHeader::parse(&mut r);
        self.base_ext = BaseExt {
            template_version: r.u8(),
            power_table_offset: r.i8(),
            tuning_caps: r.bytes(),
        };

        r.seek(OFF_CUST_DATA);
        self.cust_data = (0..CUST_DATA_BYTES).map(|_| r.u8()).collect();

        r.seek(OFF_MODAL_2G);
        self.modal_2g = ModalHeader::parse(&mut r);
        r.seek(OFF_MODAL_5G);
        self.modal_5g = ModalHeader::parse(&mut r);

        self.cal_tp_cck =
            parse_split_target_powers(&mut r, OFF_TP_FREQ_CCK, OFF_TP_CCK, NUM_TARGET_CHANS_CCK, 4);
        self.cal_tp_2g =
            parse_split_target_powers(&mut r, OFF_TP_FREQ_2G, OFF_TP_2G, NUM_TARGET_CHANS_2G, 4);
        self.cal_tp_2g_ht20 = parse_split_target_powers(
            &mut r,
            OFF_TP_FREQ_2G_HT20,
            OFF_TP_2G_HT20,
            NUM_TARGET_CHANS_2G,
            NUM_HT_RATES,
        );
        self.cal_tp_2g_ht40 = parse_split_target_powers(
            &mut r,
            OFF_TP_FREQ_2G_HT40,
            OFF_TP_2G_HT40,
            NUM_TARGET_CHANS_2G,
            NUM_HT_RATES,
        );
        self.cal_tp_5g =
            parse_split_target_powers(&mut r, OFF_TP_FREQ_5G, OFF_TP_5G, NUM_TARGET_CHANS_5G, 4);
        self.cal_tp_5g_ht20 = parse_split_target_powers(
            &mut r,
            OFF_TP_FREQ_5G_HT20,
            OFF_TP_5G_HT20,
            NUM_TARGET_CHANS_5G,
            NUM_HT_RATES,
        );
        self.cal_tp_5g_ht40 = parse_split_target_powers(
            &mut r,
            OFF_TP_FREQ_5G_HT40,
            OFF_TP_5G_HT40,
            NUM_TARGET_CHANS_5G,
            NUM_HT_RATES,
        );

        r.seek(OFF_CTL_INDEX_2G);
        self.ctl_index_2g = (0..NUM_CTLS_2G).map(|_| r.u8()).collect();
        self.ctl_data_2g = parse_split_ctl(
            &mut r,
            OFF_CTL_FREQ_2G,
            OFF_CTL_DATA_2G,
            NUM_CTLS_2G,
            NUM_BAND_EDGES_2G,
        );

        r.seek(OFF_CTL_INDEX_5G);
        self.ctl_index_5g = (0..NUM_CTLS_5G).map(|_| r.u8()).collect();
        self.ctl_data_5g = parse_split_ctl(
            &mut r,
            OFF_CTL_FREQ_5G,
            OFF_CTL_DATA_5G,
            NUM_CTLS_5G,
            NUM_BAND_EDGES_5G,
        );
    }
}

impl<C: Connector> EepromOps<C> for Eep9003 {
    fn fill(&mut self, session: &mut Session<C>) -> Result<()> {
        let start = EEP_START_LOC as u32;
        common::toggle_byteswap(session, start + BASE_EEPMISC_WORD, start + BASE_BINBUILD_WORD)?;

        self.words = session.eeprom_read_run(0, IMAGE_WORDS)?;
        self.parse();
        Ok(())
    }

    fn check(&mut self) -> Result<()> {
        if self.words.len() != IMAGE_WORDS {
            return Err(common::not_filled());
        }

        let magic = self.words[0];
        if magic != AR5416_EEPROM_MAGIC && magic.swap_bytes() != AR5416_EEPROM_MAGIC {
            return Err(Error::BadMagic { magic });
        }

        if self.base.version_major() != AR5416_EEP_VER_MAJOR {
            return Err(Error::BadVersion {
                version: self.base.version,
            });
        }

        let length = self.base.length;
        if (length as usize) < BASE_HEADER_BYTES + BASE_EXT_BYTES {
            return Err(Error::BadLength { length });
        }

        let el = (length as usize / 2).min(EEP_WORDS);
        let sum = common::calc_csum(&self.words[EEP_START_LOC..EEP_START_LOC + el]);
        if sum != 0 {
            return Err(Error::ChecksumMismatch { sum });
        }

        Ok(())
    }

    fn dump_base_header(&self, w: &mut dyn Write) -> Result<()> {
        common::write_sect_name(w, "EEPROM Base Header")?;
        common::dump_base_header(w, &self.base)?;
        writeln!(
            w,
            "{:<30} : {}",
            "Template Version", self.base_ext.template_version
        )?;
        writeln!(
            w,
            "{:<30} : {}",
            "Power Table Offset", self.base_ext.power_table_offset
        )?;
        writeln!(
            w,
            "{:<30} : 0x{:02X} 0x{:02X}",
            "Tuning Caps", self.base_ext.tuning_caps[0], self.base_ext.tuning_caps[1]
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

    fn dump_modal_header(&self, w: &mut dyn Write) -> Result<()> {
        common::write_sect_name(w, "EEPROM Modal Header")?;

        common::write_subsect_name(w, "2 GHz modal header")?;
        self.modal_2g.dump(w)?;
        writeln!(w)?;

        common::write_subsect_name(w, "5 GHz modal header")?;
        self.modal_5g.dump(w)?;
        writeln!(w)?;
        Ok(())
    }

    fn dump_power_info(&self, w: &mut dyn Write) -> Result<()> {
        common::write_sect_name(w, "EEPROM Power Info")?;

        let tables: [(&str, &[TargetPower], usize, &[&str], bool); 7] = [
            ("2 GHz CCK per-rate target power", &self.cal_tp_cck, 4, &RATES_CCK, true),
            ("2 GHz OFDM per-rate target power", &self.cal_tp_2g, 4, &RATES_OFDM, true),
            (
                "2 GHz HT20 per-rate target power",
                &self.cal_tp_2g_ht20,
                NUM_HT_RATES,
                &RATES_HT_9003,
                true,
            ),
            (
                "2 GHz HT40 per-rate target power",
                &self.cal_tp_2g_ht40,
                NUM_HT_RATES,
                &RATES_HT_9003,
                true,
            ),
            ("5 GHz OFDM per-rate target power", &self.cal_tp_5g, 4, &RATES_OFDM, false),
            (
                "5 GHz HT20 per-rate target power",
                &self.cal_tp_5g_ht20,
                NUM_HT_RATES,
                &RATES_HT_9003,
                false,
            ),
            (
                "5 GHz HT40 per-rate target power",
                &self.cal_tp_5g_ht40,
                NUM_HT_RATES,
                &RATES_HT_9003,
                false,
            ),
        ];
        for (name, caldata, nrates, rates, is_2g) in tables {
            common::write_subsect_name(w, name)?;
            common::dump_target_power(w, caldata, nrates, rates, is_2g)?;
            writeln!(w)?;
        }

        common::write_subsect_name(w, "CTL data (2 GHz)")?;
        common::dump_ctl(w, &self.ctl_index_2g, &self.ctl_data_2g, 1, NUM_BAND_EDGES_2G)?;

        common::write_subsect_name(w, "CTL data (5 GHz)")?;
        common::dump_ctl(w, &self.ctl_index_5g, &self.ctl_data_5g, 1, NUM_BAND_EDGES_5G)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_word_aligned() {
        assert_eq!(EEP_BYTES % 2, 0);
        assert_eq!(OFF_MODAL_2G % 4, 0);
        assert_eq!(OFF_MODAL_5G % 4, 0);
        assert_eq!(EEP_WORDS, 494);
        assert_eq!(IMAGE_WORDS, 0x40 + 494);
    }

    #[test]
    fn split_tables_walk_their_freqbin_sentinels() {
        let mut words = vec![0u16; IMAGE_WORDS];

        // Two CCK channels are supported; terminate after the first.
        let set = |words: &mut Vec<u16>, pos: usize, b: u8| {
            if pos % 2 == 0 {
                words[pos / 2] |= u16::from(b);
            } else {
                words[pos / 2] |= u16::from(b) << 8;
            }
        };
        let base = EEP_START_LOC * 2;
        set(&mut words, base + OFF_TP_FREQ_CCK, 112);
        set(&mut words, base + OFF_TP_FREQ_CCK + 1, 0xFF);
        for (i, p) in [60u8, 58, 56, 54].iter().enumerate() {
            set(&mut words, base + OFF_TP_CCK + i, *p);
        }

        let mut eep = Eep9003 {
            words,
            ..Eep9003::default()
        };
        eep.parse();

        assert_eq!(eep.cal_tp_cck.len(), 1);
        assert_eq!(eep.cal_tp_cck[0].bchannel, 112);
        assert_eq!(&eep.cal_tp_cck[0].tpow2x[..4], &[60, 58, 56, 54]);
        assert_eq!(eep.ctl_data_2g.len(), NUM_CTLS_2G);
        assert_eq!(eep.ctl_data_5g[0].len(), NUM_BAND_EDGES_5G);
    }
}
