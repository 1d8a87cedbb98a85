//! The "default" EEPROM layout: AR5416/AR5418, AR9160 and AR9280.
//!
//! Dual-band layout with three RF chains: one modal header per band,
//! legacy and HT target-power tables for both bands, and 24 CTL entries
//! of 3x8 band edges each.

use std::fmt::{self, Write};

use super::common::{
    self, BaseHeader, CtlEdge, EepInit, TargetPower, WordReader, BASE_BINBUILD_WORD,
    BASE_EEPMISC_WORD, BASE_HEADER_BYTES, RATES_CCK, RATES_HT, RATES_OFDM,
};
use super::EepromOps;
use crate::connector::Connector;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::session::Session;

/// Word offset of the calibration structure within the EEPROM.
pub const EEP_START_LOC: usize = 0x100;

/// RF chains in this generation.
pub const MAX_CHAINS: usize = 3;
/// CTL entries.
pub const NUM_CTLS: usize = 24;
/// Band edges per CTL entry and chain.
pub const NUM_BAND_EDGES: usize = 8;

/// Target-power channels: 5 GHz legacy.
pub const NUM_TARGET_CHANS_5G: usize = 8;
/// Target-power channels: 5 GHz HT20/HT40.
pub const NUM_TARGET_CHANS_HT_5G: usize = 8;
/// Target-power channels: 2.4 GHz CCK.
pub const NUM_TARGET_CHANS_CCK: usize = 3;
/// Target-power channels: 2.4 GHz legacy OFDM.
pub const NUM_TARGET_CHANS_2G: usize = 4;
/// Target-power channels: 2.4 GHz HT20/HT40.
pub const NUM_TARGET_CHANS_HT_2G: usize = 4;

const NUM_CAL_PIERS_5G: usize = 8;
const NUM_CAL_PIERS_2G: usize = 4;
const NUM_PD_GAINS: usize = 4;
const PD_GAIN_ICEPTS: usize = 5;
// Power and Vpd curves per pier and chain.
const PIER_DATA_BYTES: usize = 2 * NUM_PD_GAINS * PD_GAIN_ICEPTS;

const CUST_DATA_BYTES: usize = 64;
const MODAL_BYTES: usize = 72;
const TP_LEG_BYTES: usize = 1 + 4;
const TP_HT_BYTES: usize = 1 + 8;

// Byte offsets within the calibration structure.
const OFF_CUST_DATA: usize = BASE_HEADER_BYTES;
const OFF_MODAL: usize = OFF_CUST_DATA + CUST_DATA_BYTES;
const OFF_CAL_FREQ_PIER_5G: usize = OFF_MODAL + 2 * MODAL_BYTES;
const OFF_CAL_FREQ_PIER_2G: usize = OFF_CAL_FREQ_PIER_5G + NUM_CAL_PIERS_5G;
const OFF_CAL_PIER_DATA_5G: usize = OFF_CAL_FREQ_PIER_2G + NUM_CAL_PIERS_2G;
const OFF_CAL_PIER_DATA_2G: usize =
    OFF_CAL_PIER_DATA_5G + MAX_CHAINS * NUM_CAL_PIERS_5G * PIER_DATA_BYTES;
/// Byte offset of the 5 GHz legacy target-power table.
pub const OFF_CAL_TP_5G: usize =
    OFF_CAL_PIER_DATA_2G + MAX_CHAINS * NUM_CAL_PIERS_2G * PIER_DATA_BYTES;
/// Byte offset of the 5 GHz HT20 target-power table.
pub const OFF_CAL_TP_5G_HT20: usize = OFF_CAL_TP_5G + NUM_TARGET_CHANS_5G * TP_LEG_BYTES;
/// Byte offset of the 5 GHz HT40 target-power table.
pub const OFF_CAL_TP_5G_HT40: usize = OFF_CAL_TP_5G_HT20 + NUM_TARGET_CHANS_HT_5G * TP_HT_BYTES;
/// Byte offset of the CCK target-power table.
pub const OFF_CAL_TP_CCK: usize = OFF_CAL_TP_5G_HT40 + NUM_TARGET_CHANS_HT_5G * TP_HT_BYTES;
/// Byte offset of the 2.4 GHz legacy target-power table.
pub const OFF_CAL_TP_2G: usize = OFF_CAL_TP_CCK + NUM_TARGET_CHANS_CCK * TP_LEG_BYTES;
/// Byte offset of the 2.4 GHz HT20 target-power table.
pub const OFF_CAL_TP_2G_HT20: usize = OFF_CAL_TP_2G + NUM_TARGET_CHANS_2G * TP_LEG_BYTES;
/// Byte offset of the 2.4 GHz HT40 target-power table.
pub const OFF_CAL_TP_2G_HT40: usize = OFF_CAL_TP_2G_HT20 + NUM_TARGET_CHANS_HT_2G * TP_HT_BYTES;
/// Byte offset of the CTL index array.
pub const OFF_CTL_INDEX: usize = OFF_CAL_TP_2G_HT40 + NUM_TARGET_CHANS_HT_2G * TP_HT_BYTES;
/// Byte offset of the CTL edge data.
pub const OFF_CTL_DATA: usize = OFF_CTL_INDEX + NUM_CTLS;

/// Size of the calibration structure in bytes (padded to a word).
pub const EEP_BYTES: usize = OFF_CTL_DATA + NUM_CTLS * MAX_CHAINS * NUM_BAND_EDGES * 2 + 1;
/// Size of the calibration structure in words.
pub const EEP_WORDS: usize = EEP_BYTES / 2;
/// Total image size in words, init region included.
pub const IMAGE_WORDS: usize = EEP_START_LOC + EEP_WORDS;

/// Spur-mitigation channel entry.
#[derive(Debug, Clone, Copy, Default)]
struct SpurChan {
    spur_chan: u16,
    range_low: u8,
    range_high: u8,
}

/// Per-band modal (RF) calibration header.
#[derive(Debug, Clone, Default)]
struct ModalHeader {
    ant_ctrl_chain: [u32; MAX_CHAINS],
    ant_ctrl_common: u32,
    antenna_gain_ch: [i8; MAX_CHAINS],
    switch_settling: u8,
    tx_rx_atten_ch: [u8; MAX_CHAINS],
    rx_tx_margin_ch: [u8; MAX_CHAINS],
    adc_desired_size: i8,
    pga_desired_size: i8,
    xlna_gain_ch: [u8; MAX_CHAINS],
    tx_end_to_xpa_off: u8,
    tx_end_to_rx_on: u8,
    tx_frame_to_xpa_on: u8,
    thresh62: u8,
    noise_floor_thresh_ch: [i8; MAX_CHAINS],
    xpd_gain: u8,
    xpd: u8,
    iq_cal_i_ch: [i8; MAX_CHAINS],
    iq_cal_q_ch: [i8; MAX_CHAINS],
    pd_gain_overlap: u8,
    ob: u8,
    db: u8,
    xpa_bias_lvl: u8,
    spur_chans: [SpurChan; 5],
}

impl ModalHeader {
    fn parse(r: &mut WordReader) -> Self {
        let mut hdr = ModalHeader {
            ant_ctrl_chain: [r.u32(), r.u32(), r.u32()],
            ant_ctrl_common: r.u32(),
            antenna_gain_ch: [r.i8(), r.i8(), r.i8()],
            switch_settling: r.u8(),
            tx_rx_atten_ch: [r.u8(), r.u8(), r.u8()],
            rx_tx_margin_ch: [r.u8(), r.u8(), r.u8()],
            adc_desired_size: r.i8(),
            pga_desired_size: r.i8(),
            xlna_gain_ch: [r.u8(), r.u8(), r.u8()],
            tx_end_to_xpa_off: r.u8(),
            tx_end_to_rx_on: r.u8(),
            tx_frame_to_xpa_on: r.u8(),
            thresh62: r.u8(),
            noise_floor_thresh_ch: [r.i8(), r.i8(), r.i8()],
            xpd_gain: r.u8(),
            xpd: r.u8(),
            iq_cal_i_ch: [r.i8(), r.i8(), r.i8()],
            iq_cal_q_ch: [r.i8(), r.i8(), r.i8()],
            pd_gain_overlap: r.u8(),
            ob: r.u8(),
            db: r.u8(),
            xpa_bias_lvl: r.u8(),
            spur_chans: [SpurChan::default(); 5],
        };
        for spur in &mut hdr.spur_chans {
            *spur = SpurChan {
                spur_chan: r.u16(),
                range_low: r.u8(),
                range_high: r.u8(),
            };
        }
        r.skip(2); // reserved
        hdr
    }

    fn dump(&self, w: &mut dyn Write) -> fmt::Result {
        let chains_u8 = |v: &[u8; MAX_CHAINS]| format!("{} / {} / {}", v[0], v[1], v[2]);
        let chains_i8 = |v: &[i8; MAX_CHAINS]| format!("{} / {} / {}", v[0], v[1], v[2]);

        writeln!(
            w,
            "{:<20} : 0x{:08X} / 0x{:08X} / 0x{:08X}",
            "Ant Ctrl Chain",
            self.ant_ctrl_chain[0],
            self.ant_ctrl_chain[1],
            self.ant_ctrl_chain[2]
        )?;
        writeln!(w, "{:<20} : 0x{:08X}", "Ant Ctrl Common", self.ant_ctrl_common)?;
        writeln!(
            w,
            "{:<20} : {}",
            "Antenna Gain",
            chains_i8(&self.antenna_gain_ch)
        )?;
        writeln!(w, "{:<20} : {}", "Switch Settling", self.switch_settling)?;
        writeln!(
            w,
            "{:<20} : {}",
            "TxRx Attenuation",
            chains_u8(&self.tx_rx_atten_ch)
        )?;
        writeln!(
            w,
            "{:<20} : {}",
            "RxTx Margin",
            chains_u8(&self.rx_tx_margin_ch)
        )?;
        writeln!(w, "{:<20} : {}", "ADC Desired Size", self.adc_desired_size)?;
        writeln!(w, "{:<20} : {}", "PGA Desired Size", self.pga_desired_size)?;
        writeln!(w, "{:<20} : {}", "xLNA Gain", chains_u8(&self.xlna_gain_ch))?;
        writeln!(w, "{:<20} : {}", "TxEnd to xPA Off", self.tx_end_to_xpa_off)?;
        writeln!(w, "{:<20} : {}", "TxEnd to Rx On", self.tx_end_to_rx_on)?;
        writeln!(w, "{:<20} : {}", "TxFrame to xPA On", self.tx_frame_to_xpa_on)?;
        writeln!(w, "{:<20} : {}", "Thresh62", self.thresh62)?;
        writeln!(
            w,
            "{:<20} : {}",
            "NF Thresh",
            chains_i8(&self.noise_floor_thresh_ch)
        )?;
        writeln!(w, "{:<20} : 0x{:02X}", "xPD Gain", self.xpd_gain)?;
        writeln!(w, "{:<20} : {}", "xPD", self.xpd)?;
        writeln!(w, "{:<20} : {}", "IQ Cal I", chains_i8(&self.iq_cal_i_ch))?;
        writeln!(w, "{:<20} : {}", "IQ Cal Q", chains_i8(&self.iq_cal_q_ch))?;
        writeln!(w, "{:<20} : {}", "PD Gain Overlap", self.pd_gain_overlap)?;
        writeln!(w, "{:<20} : {}", "OB", self.ob)?;
        writeln!(w, "{:<20} : {}", "DB", self.db)?;
        writeln!(w, "{:<20} : {}", "xPA Bias Level", self.xpa_bias_lvl)?;
        for (i, spur) in self.spur_chans.iter().enumerate() {
            if spur.spur_chan == 0 || spur.spur_chan == 0xFFFF {
                continue;
            }
            writeln!(
                w,
                "Spur Channel {i}       : 0x{:04X} [{}, {}]",
                spur.spur_chan, spur.range_low, spur.range_high
            )?;
        }
        Ok(())
    }
}

/// Extractor for the default layout.
#[derive(Default)]
pub struct EepDef {
    words: Vec<u16>,
    init: EepInit,
    base: BaseHeader,
    cust_data: Vec<u8>,
    // modal[0] covers 5 GHz, modal[1] covers 2.4 GHz
    modal: [ModalHeader; 2],
    cal_tp_5g: Vec<TargetPower>,
    cal_tp_5g_ht20: Vec<TargetPower>,
    cal_tp_5g_ht40: Vec<TargetPower>,
    cal_tp_cck: Vec<TargetPower>,
    cal_tp_2g: Vec<TargetPower>,
    cal_tp_2g_ht20: Vec<TargetPower>,
    cal_tp_2g_ht40: Vec<TargetPower>,
    ctl_index: Vec<u8>,
    ctl_data: Vec<Vec<CtlEdge>>,
}

impl EepDef {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(&mut self) {
        self.init = EepInit::parse(&self.words[..EEP_START_LOC]);

        let mut r = WordReader::new(&self.words[EEP_START_LOC..]);
        self.base = BaseHeader::parse(&mut r);

        r.seek(OFF_CUST_DATA);
        self.cust_data = (0..CUST_DATA_BYTES).map(|_| r.u8()).collect();

        r.seek(OFF_MODAL);
        self.modal = [ModalHeader::parse(&mut r), ModalHeader::parse(&mut r)];

        r.seek(OFF_CAL_TP_5G);
        self.cal_tp_5g = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_5G, 4);
        self.cal_tp_5g_ht20 = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_HT_5G, 8);
        self.cal_tp_5g_ht40 = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_HT_5G, 8);
        self.cal_tp_cck = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_CCK, 4);
        self.cal_tp_2g = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_2G, 4);
        self.cal_tp_2g_ht20 = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_HT_2G, 8);
        self.cal_tp_2g_ht40 = common::parse_target_powers(&mut r, NUM_TARGET_CHANS_HT_2G, 8);

        r.seek(OFF_CTL_INDEX);
        self.ctl_index = (0..NUM_CTLS).map(|_| r.u8()).collect();
        self.ctl_data = common::parse_ctl_data(&mut r, NUM_CTLS, MAX_CHAINS, NUM_BAND_EDGES);
    }
}

impl<C: Connector> EepromOps<C> for EepDef {
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
        if (length as usize) < BASE_HEADER_BYTES {
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
        common::write_sect_name(w, "EEPROM Init Data")?;
        common::dump_eep_init(w, &self.init)?;

        common::write_sect_name(w, "EEPROM Base Header")?;
        common::dump_base_header(w, &self.base)?;
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
        self.modal[1].dump(w)?;
        writeln!(w)?;

        common::write_subsect_name(w, "5 GHz modal header")?;
        self.modal[0].dump(w)?;
        writeln!(w)?;
        Ok(())
    }

    fn dump_power_info(&self, w: &mut dyn Write) -> Result<()> {
        common::write_sect_name(w, "EEPROM Power Info")?;

        let tables: [(&str, &[TargetPower], usize, &[&str], bool); 7] = [
            ("2 GHz CCK per-rate target power", &self.cal_tp_cck, 4, &RATES_CCK, true),
            ("2 GHz OFDM per-rate target power", &self.cal_tp_2g, 4, &RATES_OFDM, true),
            ("2 GHz HT20 per-rate target power", &self.cal_tp_2g_ht20, 8, &RATES_HT, true),
            ("2 GHz HT40 per-rate target power", &self.cal_tp_2g_ht40, 8, &RATES_HT, true),
            ("5 GHz OFDM per-rate target power", &self.cal_tp_5g, 4, &RATES_OFDM, false),
            ("5 GHz HT20 per-rate target power", &self.cal_tp_5g_ht20, 8, &RATES_HT, false),
            ("5 GHz HT40 per-rate target power", &self.cal_tp_5g_ht40, 8, &RATES_HT, false),
        ];
        for (name, caldata, nrates, rates, is_2g) in tables {
            common::write_subsect_name(w, name)?;
            common::dump_target_power(w, caldata, nrates, rates, is_2g)?;
            writeln!(w)?;
        }

        common::write_subsect_name(w, "CTL data")?;
        common::dump_ctl(w, &self.ctl_index, &self.ctl_data, MAX_CHAINS, NUM_BAND_EDGES)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_word_aligned() {
        assert_eq!(EEP_BYTES % 2, 0);
        assert_eq!(OFF_MODAL % 4, 0);
        assert_eq!(EEP_WORDS, 1580);
        assert_eq!(IMAGE_WORDS, 0x100 + 1580);
    }

    #[test]
    fn base_header_field_words_match_layout() {
        // The byte-order resolver relies on these two word offsets.
        assert_eq!(BASE_EEPMISC_WORD, 3);
        assert_eq!(BASE_BINBUILD_WORD, 13);
    }

    #[test]
    fn parses_target_powers_and_ctls_from_raw_words() {
        let mut words = vec![0u16; IMAGE_WORDS];

        // One CCK channel, then the sentinel.
        let tp = EEP_START_LOC * 2 + OFF_CAL_TP_CCK;
        let bytes = [112u8, 60, 58, 56, 54, 0xFF];
        for (i, &b) in bytes.iter().enumerate() {
            let pos = tp + i;
            if pos % 2 == 0 {
                words[pos / 2] |= u16::from(b);
            } else {
                words[pos / 2] |= u16::from(b) << 8;
            }
        }

        // One CTL entry: FCC 2GHz CCK, one edge on chain 0.
        let idx = EEP_START_LOC * 2 + OFF_CTL_INDEX;
        assert_eq!(idx % 2, 1);
        words[idx / 2] |= 0x11u16 << 8;
        let data = EEP_START_LOC * 2 + OFF_CTL_DATA;
        assert_eq!(data % 2, 1);
        words[data / 2] |= u16::from(112u8) << 8; // bChannel
        words[data / 2 + 1] |= u16::from(0x3Cu8); // ctl byte

        let mut eep = EepDef {
            words,
            ..EepDef::default()
        };
        eep.parse();

        assert_eq!(eep.cal_tp_cck.len(), 1);
        assert_eq!(eep.cal_tp_cck[0].bchannel, 112);
        assert_eq!(&eep.cal_tp_cck[0].tpow2x[..4], &[60, 58, 56, 54]);

        assert_eq!(eep.ctl_index[0], 0x11);
        assert_eq!(eep.ctl_data[0][0].bchannel, 112);
        assert_eq!(eep.ctl_data[0][0].ctl, 0x3C);
    }
}
