//! Atheros NIC EEPROM dump utility.
//!
//! Reads the calibration EEPROM of an Atheros wireless card through its
//! memory-mapped PCI registers and prints the decoded sections.

use std::process::ExitCode;

use clap::Parser;
use log::error;

use edump::{DumpSection, EepMap, PciConnector, PciSlot, Session};

#[derive(Parser, Debug)]
#[command(
    name = "edump",
    version,
    about = "Atheros NIC EEPROM dump utility",
    long_about = None,
)]
struct Cli {
    /// PCI slot of the card: <domain>:<bus>:<dev> as displayed by lspci
    #[arg(short = 'P', long = "pci", value_name = "slot")]
    slot: String,
    /// Dump base EEPROM header
    #[arg(short = 'b', long)]
    base: bool,
    /// Dump modal EEPROM header(s)
    #[arg(short = 'm', long)]
    modal: bool,
    /// Dump power calibration EEPROM info
    #[arg(short = 'p', long)]
    power: bool,
    /// Dump everything from EEPROM (default)
    #[arg(short = 'a', long)]
    all: bool,
}

impl Cli {
    fn section(&self) -> DumpSection {
        if self.all {
            DumpSection::All
        } else if self.base {
            DumpSection::BaseHeader
        } else if self.modal {
            DumpSection::ModalHeader
        } else if self.power {
            DumpSection::PowerInfo
        } else {
            DumpSection::All
        }
    }
}

fn run(cli: &Cli) -> edump::Result<()> {
    let slot: PciSlot = cli.slot.parse()?;
    let con = PciConnector::open(&slot)?;
    let mut session = Session::new(con)?;

    let rev = session.revision();
    println!("Atheros AR{} MAC/BB Rev:{:x}", rev.name(), rev.mac_rev);

    let mut ops = EepMap::select(rev).ops();
    ops.fill(&mut session)?;
    ops.check()?;

    let mut out = String::new();
    match cli.section() {
        DumpSection::BaseHeader => ops.dump_base_header(&mut out)?,
        DumpSection::ModalHeader => ops.dump_modal_header(&mut out)?,
        DumpSection::PowerInfo => ops.dump_power_info(&mut out)?,
        DumpSection::All => {
            ops.dump_base_header(&mut out)?;
            ops.dump_modal_header(&mut out)?;
            ops.dump_power_info(&mut out)?;
        }
    }
    print!("{out}");

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if e.is_usage() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
