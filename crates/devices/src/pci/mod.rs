//! PCI configuration-space plumbing for the primary bus.

mod bus;

pub use bus::{
    PciBus, PciBusError, PciConfigMechanism1, PciConfigPorts, PCI_CFG_ADDR_PORT, PCI_CFG_DATA_PORT,
};

/// PCI bus/device/function identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PciBdf {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciBdf {
    /// Creates a new BDF.
    ///
    /// The caller is responsible for ensuring the values are within the PCI ranges:
    /// device < 32, function < 8.
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }

    /// Packs into the BDF bits of a mechanism #1 address (`(cf8 >> 8) & 0xFFFF`).
    pub const fn pack_u16(self) -> u16 {
        debug_assert!(self.device < 32);
        debug_assert!(self.function < 8);
        ((self.bus as u16) << 8) | ((self.device as u16) << 3) | (self.function as u16)
    }

    pub const fn unpack_u16(v: u16) -> Self {
        Self {
            bus: (v >> 8) as u8,
            device: ((v >> 3) & 0x1f) as u8,
            function: (v & 0x7) as u8,
        }
    }

    /// The same device with function 0, the key a multi-function device is registered under.
    pub const fn slot(self) -> Self {
        Self::new(self.bus, self.device, 0)
    }
}

impl std::fmt::Display for PciBdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// A device attached to a slot on the PCI bus.
///
/// The bus routes every config access for the slot here, one byte at a time, together with the
/// function number. Offsets handed to the device are always below
/// [`PciConfigDevice::config_space_len`].
pub trait PciConfigDevice {
    fn config_read(&mut self, function: u8, offset: u8) -> u8;
    fn config_write(&mut self, function: u8, offset: u8, value: u8);

    /// Number of implemented config-space bytes per function. Accesses beyond it read as zero
    /// and drop writes.
    fn config_space_len(&self) -> usize {
        256
    }

    /// Power-on / platform reset.
    fn reset(&mut self) {}

    /// Tears the device down after it has been detached from the bus.
    fn close(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::PciBdf;

    #[test]
    fn pack_matches_config_address_layout() {
        let bdf = PciBdf::new(0, 0x10, 0);
        let cf8 = 0x8000_0000u32 | (u32::from(bdf.pack_u16()) << 8) | 0x50;
        assert_eq!(cf8, 0x8000_8050);
        assert_eq!(PciBdf::unpack_u16(bdf.pack_u16()), bdf);
    }

    #[test]
    fn display_uses_bus_device_function_notation() {
        assert_eq!(PciBdf::new(0, 0x10, 3).to_string(), "00:10.3");
        assert_eq!(PciBdf::new(0, 0x10, 3).slot(), PciBdf::new(0, 0x10, 0));
    }
}
