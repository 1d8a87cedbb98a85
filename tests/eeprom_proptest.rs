//! Property-based tests for checksum behavior and target-power
//! extraction.
//!
//! Uses `proptest` to generate random calibration content and verify that
//! the extraction pipeline reproduces it exactly, stops at sentinels, and
//! keeps its promises under whole-image byteswaps.

use edump::constants::*;
use edump::eeprom::{calc_csum, def};
use edump::{Connector, EepMap, Result, Session};
use proptest::prelude::*;

struct SimRegs {
    srev: u32,
    eeprom: Vec<u16>,
    latched: usize,
}

impl Connector for SimRegs {
    fn reg_read(&mut self, reg: u32) -> Result<u32> {
        match reg {
            AR_SREV => Ok(self.srev),
            AR_EEPROM_STATUS_DATA | AR_EEPROM_STATUS_DATA_9300 | AR_EEPROM_STATUS_DATA_9340 => {
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

fn set_byte(words: &mut [u16], byte_pos: usize, b: u8) {
    if byte_pos % 2 == 0 {
        words[byte_pos / 2] = (words[byte_pos / 2] & 0xFF00) | u16::from(b);
    } else {
        words[byte_pos / 2] = (words[byte_pos / 2] & 0x00FF) | (u16::from(b) << 8);
    }
}

/// A valid default-layout image carrying the given CCK target-power
/// records (terminated by the sentinel when below capacity).
fn def_image_with_cck(chans: &[(u8, [u8; 4])]) -> Vec<u16> {
    let mut words = vec![0u16; def::IMAGE_WORDS];
    words[0] = AR5416_EEPROM_MAGIC;
    words[3] = AR5416_EEP_INIT_REG_END;

    let start = def::EEP_START_LOC;
    words[start] = def::EEP_BYTES as u16;
    words[start + 2] = 0xE00E;
    words[start + 3] = u16::from(AR5416_OPFLAGS_11G);
    words[start + 13] = 0x0010;

    let base = start * 2;
    for (c, (chan, powers)) in chans.iter().enumerate() {
        let rec = base + def::OFF_CAL_TP_CCK + c * 5;
        set_byte(&mut words, rec, *chan);
        for (k, p) in powers.iter().enumerate() {
            set_byte(&mut words, rec + 1 + k, *p);
        }
    }
    if chans.len() < def::NUM_TARGET_CHANS_CCK {
        set_byte(
            &mut words,
            base + def::OFF_CAL_TP_CCK + chans.len() * 5,
            AR5416_BCHAN_UNUSED,
        );
    }

    words[start + 1] = 0;
    words[start + 1] = calc_csum(&words[start..start + def::EEP_WORDS]);
    words
}

fn dump_power(eeprom: Vec<u16>) -> Result<String> {
    let con = SimRegs {
        srev: (srev::AR9280 << AR_SREV_TYPE2_S) | 0xFF,
        eeprom,
        latched: 0,
    };
    let mut session = Session::new(con)?;
    let mut ops = EepMap::select(session.revision()).ops();
    ops.fill(&mut session)?;
    ops.check()?;

    let mut out = String::new();
    ops.dump_power_info(&mut out)?;
    Ok(out)
}

/// A CCK record: channel bin below the sentinel, arbitrary half-dB
/// powers.
fn cck_record() -> impl Strategy<Value = (u8, [u8; 4])> {
    (1u8..=250, proptest::array::uniform4(any::<u8>()))
}

proptest! {
    /// An image whose checksum field is the XOR-fold of all other words
    /// folds to zero; flipping any single bit breaks it.
    #[test]
    fn checksum_cancels_and_detects_bit_flips(
        mut words in proptest::collection::vec(any::<u16>(), 8..64),
        csum_at in any::<proptest::sample::Index>(),
        flip_at in any::<proptest::sample::Index>(),
        flip_bit in 0u32..16,
    ) {
        let csum_idx = csum_at.index(words.len());
        words[csum_idx] = 0;
        words[csum_idx] = calc_csum(&words);
        prop_assert_eq!(calc_csum(&words), 0);

        let flip_idx = flip_at.index(words.len());
        words[flip_idx] ^= 1 << flip_bit;
        prop_assert_ne!(calc_csum(&words), 0);
    }

    /// The XOR fold commutes with a whole-region byteswap, so a
    /// checksum-clean image stays clean when every word is swapped.
    #[test]
    fn checksum_fold_is_swap_invariant(
        words in proptest::collection::vec(any::<u16>(), 1..64),
    ) {
        let swapped: Vec<u16> = words.iter().map(|w| w.swap_bytes()).collect();
        prop_assert_eq!(calc_csum(&swapped), calc_csum(&words).swap_bytes());
    }

    /// Hand-built target-power tables come back exactly, in order, and
    /// the walk stops at the sentinel even with capacity to spare.
    #[test]
    fn cck_target_power_round_trips(
        chans in proptest::collection::vec(cck_record(), 0..=3),
    ) {
        let out = dump_power(def_image_with_cck(&chans)).unwrap();

        let mut freq_row = format!("    {:>10}, MHz:", "Freq");
        for (chan, _) in &chans {
            freq_row.push_str(&format!("  {:4}", 2300 + u16::from(*chan)));
        }
        let cck_sect = out.split("2 GHz OFDM").next().unwrap();
        prop_assert!(cck_sect.contains(&freq_row), "missing {freq_row:?} in {cck_sect}");

        for (i, rate) in ["1 mbps", "2 mbps", "5.5 mbps", "11 mbps"].iter().enumerate() {
            let mut row = format!("    {rate:>10}, dBm:");
            for (_, powers) in &chans {
                row.push_str(&format!("  {:4.1}", f64::from(powers[i]) / 2.0));
            }
            prop_assert!(cck_sect.contains(&row), "missing {row:?} in {cck_sect}");
        }
    }

    /// Structured decode results are invariant under a whole-image
    /// byteswap once the resolver has compensated.
    #[test]
    fn dump_is_invariant_under_byteswap(
        chans in proptest::collection::vec(cck_record(), 0..=3),
    ) {
        let words = def_image_with_cck(&chans);
        let swapped: Vec<u16> = words.iter().map(|w| w.swap_bytes()).collect();

        let out_a = dump_power(words).unwrap();
        let out_b = dump_power(swapped).unwrap();
        prop_assert_eq!(out_a, out_b);
    }
}
