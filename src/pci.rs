//! PCI register connector: maps BAR0 of an Atheros NIC through sysfs.
//!
//! The card is addressed by its PCI slot (`<domain>:<bus>:<dev>`, as
//! displayed by `lspci`). Any function number within the slot is accepted;
//! the first one present is used. The vendor/device identity is checked
//! against the known Atheros set before the BAR is mapped.

use std::ffi::CString;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, info};

use crate::connector::Connector;
use crate::constants::{ATHEROS_VENDOR_ID, SUPPORTED_DEVICE_IDS};
use crate::error::{Error, Result};

/// A PCI slot: `<domain>:<bus>:<dev>`, three colon-separated hex fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciSlot {
    /// PCI domain (a.k.a. segment).
    pub domain: u16,
    /// Bus number.
    pub bus: u8,
    /// Device number within the bus.
    pub dev: u8,
}

impl FromStr for PciSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedSelector(s.to_owned());

        let mut fields = s.split(':');
        let domain = fields.next().ok_or_else(malformed)?;
        let bus = fields.next().ok_or_else(malformed)?;
        let dev = fields.next().ok_or_else(malformed)?;
        if fields.next().is_some() {
            return Err(malformed());
        }

        Ok(PciSlot {
            domain: u16::from_str_radix(domain, 16).map_err(|_| malformed())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| malformed())?,
            dev: u8::from_str_radix(dev, 16).map_err(|_| malformed())?,
        })
    }
}

impl std::fmt::Display for PciSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:02x}:{:02x}", self.domain, self.bus, self.dev)
    }
}

/// An open, memory-mapped Atheros PCI device.
///
/// Owns the BAR0 mapping for its whole lifetime; the mapping is released
/// on drop.
pub struct PciConnector {
    map: *mut libc::c_void,
    size: usize,
    device_id: u16,
}

// The mapping is only ever read through &mut self.
unsafe impl Send for PciConnector {}

impl PciConnector {
    /// Open the device in the given slot and map its register BAR.
    ///
    /// Fails with [`Error::UnsupportedDevice`] if the slot holds anything
    /// but a known Atheros wireless chip, and with an I/O error if the
    /// slot is empty or `resource0` cannot be mapped (typically a
    /// permissions problem).
    pub fn open(slot: &PciSlot) -> Result<Self> {
        let dir = Self::find_function(slot)?;

        let vendor = read_sysfs_id(&dir.join("vendor"))?;
        let device = read_sysfs_id(&dir.join("device"))?;
        if vendor != ATHEROS_VENDOR_ID || !SUPPORTED_DEVICE_IDS.contains(&device) {
            return Err(Error::UnsupportedDevice { vendor, device });
        }
        info!("found device ID: 0x{device:04x}");

        let bar = dir.join("resource0");
        let size = fs::metadata(&bar)?.len() as usize;
        if size == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid base address",
            )));
        }

        let map = unsafe { map_resource(&bar, size)? };
        debug!("mapped {size} bytes of IO region for {slot}");

        Ok(PciConnector {
            map,
            size,
            device_id: device,
        })
    }

    /// Locate the sysfs directory of the first function present in the slot.
    fn find_function(slot: &PciSlot) -> Result<PathBuf> {
        for func in 0..8 {
            let dir = PathBuf::from(format!("/sys/bus/pci/devices/{slot}.{func}"));
            if dir.is_dir() {
                return Ok(dir);
            }
        }
        Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no PCI device in slot {slot}"),
        )))
    }

    /// The PCI device ID of the mapped card.
    pub fn device_id(&self) -> u16 {
        self.device_id
    }
}

impl Connector for PciConnector {
    fn reg_read(&mut self, reg: u32) -> Result<u32> {
        let off = reg as usize;
        if off + 4 > self.size {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("register 0x{reg:08X} outside the {}-byte BAR", self.size),
            )));
        }
        // Device registers are little-endian.
        let raw = unsafe { (self.map.add(off) as *const u32).read_volatile() };
        Ok(u32::from_le(raw))
    }
}

impl Drop for PciConnector {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.map, self.size);
        }
    }
}

/// Parse a sysfs id file of the form `0x168c`.
fn read_sysfs_id(path: &std::path::Path) -> Result<u16> {
    let text = fs::read_to_string(path)?;
    let text = text.trim().trim_start_matches("0x");
    u16::from_str_radix(text, 16).map_err(|_| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unparsable sysfs id in {}", path.display()),
        ))
    })
}

/// Map a sysfs `resource0` file read-only.
unsafe fn map_resource(path: &std::path::Path, size: usize) -> Result<*mut libc::c_void> {
    let cpath = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "bad path")))?;

    let fd = libc::open(cpath.as_ptr(), libc::O_RDWR | libc::O_SYNC);
    if fd < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }

    let map = libc::mmap(
        std::ptr::null_mut(),
        size,
        libc::PROT_READ,
        libc::MAP_SHARED,
        fd,
        0,
    );
    if map == libc::MAP_FAILED {
        let err = io::Error::last_os_error();
        libc::close(fd);
        return Err(Error::Io(err));
    }

    // The mapping keeps the BAR accessible on its own.
    libc::close(fd);
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_parses_hex_fields() {
        let slot: PciSlot = "0000:03:1c".parse().unwrap();
        assert_eq!(
            slot,
            PciSlot {
                domain: 0,
                bus: 3,
                dev: 0x1c
            }
        );
        assert_eq!(slot.to_string(), "0000:03:1c");
    }

    #[test]
    fn slot_rejects_junk() {
        for bad in ["", "0000", "0000:03", "0000:03:1c:0", "zz:03:1c", "0:3:ggg"] {
            let err = bad.parse::<PciSlot>().unwrap_err();
            assert!(
                matches!(err, Error::MalformedSelector(_)),
                "{bad:?} should be a selector error"
            );
            assert!(err.is_usage());
        }
    }

    #[test]
    fn slot_accepts_short_fields() {
        let slot: PciSlot = "0:3:c".parse().unwrap();
        assert_eq!(slot.domain, 0);
        assert_eq!(slot.bus, 3);
        assert_eq!(slot.dev, 0xC);
    }
}
