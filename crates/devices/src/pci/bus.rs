use crate::pci::{PciBdf, PciConfigDevice};
use hb4_platform::io::{IoPortBus, PortIoDevice};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

pub const PCI_CFG_ADDR_PORT: u16 = 0xCF8;
pub const PCI_CFG_DATA_PORT: u16 = 0xCFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PciBusError {
    #[error("PCI slot {0} is already occupied")]
    SlotOccupied(PciBdf),
    #[error("PCI slot {0} has no device")]
    EmptySlot(PciBdf),
}

/// The primary PCI bus.
///
/// Devices are registered per slot (function 0 of a device number) and receive the accessed
/// function number with every config access.
#[derive(Default)]
pub struct PciBus {
    devices: BTreeMap<PciBdf, Box<dyn PciConfigDevice>>,
}

impl PciBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(
        &mut self,
        bdf: PciBdf,
        device: Box<dyn PciConfigDevice>,
    ) -> Result<(), PciBusError> {
        let slot = bdf.slot();
        if self.devices.contains_key(&slot) {
            return Err(PciBusError::SlotOccupied(slot));
        }
        tracing::debug!(%slot, "PCI device attached");
        self.devices.insert(slot, device);
        Ok(())
    }

    /// Detaches the device in `bdf`'s slot and hands it back to the caller.
    pub fn remove_device(&mut self, bdf: PciBdf) -> Result<Box<dyn PciConfigDevice>, PciBusError> {
        let slot = bdf.slot();
        self.devices
            .remove(&slot)
            .ok_or(PciBusError::EmptySlot(slot))
    }

    pub fn is_occupied(&self, bdf: PciBdf) -> bool {
        self.devices.contains_key(&bdf.slot())
    }

    pub fn iter_device_addrs(&self) -> impl Iterator<Item = PciBdf> + '_ {
        self.devices.keys().copied()
    }

    /// Resets every device in ascending slot order.
    pub fn reset(&mut self) {
        for dev in self.devices.values_mut() {
            dev.reset();
        }
    }

    /// Reads `size` bytes (1, 2 or 4) starting at `offset`, little-endian.
    pub fn read_config(&mut self, bdf: PciBdf, offset: u16, size: u8) -> u32 {
        assert!(matches!(size, 1 | 2 | 4), "invalid config read size {size}");
        let Some(dev) = self.devices.get_mut(&bdf.slot()) else {
            // 0xFFFF_FFFF for non-existent device (common convention).
            return 0xFFFF_FFFF >> (32 - 8 * u32::from(size));
        };

        let len = dev.config_space_len();
        let mut value = 0u32;
        for i in 0..u16::from(size) {
            let addr = usize::from(offset + i);
            if addr < len {
                value |= u32::from(dev.config_read(bdf.function, addr as u8)) << (8 * i);
            }
        }
        value
    }

    pub fn write_config(&mut self, bdf: PciBdf, offset: u16, size: u8, value: u32) {
        assert!(matches!(size, 1 | 2 | 4), "invalid config write size {size}");
        let Some(dev) = self.devices.get_mut(&bdf.slot()) else {
            return;
        };

        let len = dev.config_space_len();
        for i in 0..u16::from(size) {
            let addr = usize::from(offset + i);
            if addr < len {
                dev.config_write(bdf.function, addr as u8, (value >> (8 * i)) as u8);
            }
        }
    }
}

/// Emulation of PCI Configuration Mechanism #1 (0xCF8/0xCFC).
#[derive(Debug, Default)]
pub struct PciConfigMechanism1 {
    addr: u32,
}

impl PciConfigMechanism1 {
    pub fn new() -> Self {
        Self { addr: 0 }
    }

    fn target(&self, port: u16) -> Option<(PciBdf, u16)> {
        if (self.addr & 0x8000_0000) == 0 {
            return None;
        }
        let bdf = PciBdf::unpack_u16((self.addr >> 8) as u16);
        let reg = (self.addr & 0xFC) as u16;
        Some((bdf, reg + (port - PCI_CFG_DATA_PORT)))
    }

    pub fn io_read(&mut self, pci: &mut PciBus, port: u16, size: u8) -> u32 {
        match port {
            PCI_CFG_ADDR_PORT => read_u32_part(self.addr, size),
            0xCFC..=0xCFF => match self.target(port) {
                Some((bdf, offset)) => pci.read_config(bdf, offset, size),
                None => 0xFFFF_FFFF,
            },
            _ => 0xFFFF_FFFF,
        }
    }

    pub fn io_write(&mut self, pci: &mut PciBus, port: u16, size: u8, value: u32) {
        match port {
            PCI_CFG_ADDR_PORT => {
                self.addr = write_u32_part(self.addr, size, value);
            }
            0xCFC..=0xCFF => {
                if let Some((bdf, offset)) = self.target(port) {
                    pci.write_config(bdf, offset, size, value);
                }
            }
            _ => {}
        }
    }
}

fn read_u32_part(value: u32, size: u8) -> u32 {
    match size {
        1 => value & 0xFF,
        2 => value & 0xFFFF,
        4 => value,
        _ => panic!("invalid read size {size}"),
    }
}

fn write_u32_part(old: u32, size: u8, value: u32) -> u32 {
    match size {
        1 => (old & !0xFF) | (value & 0xFF),
        2 => (old & !0xFFFF) | (value & 0xFFFF),
        4 => value,
        _ => panic!("invalid write size {size}"),
    }
}

/// Port I/O front end for [`PciConfigMechanism1`] sharing one bus between both port windows.
#[derive(Clone)]
pub struct PciConfigPorts {
    mech: Rc<RefCell<PciConfigMechanism1>>,
    bus: Rc<RefCell<PciBus>>,
}

impl PciConfigPorts {
    pub fn new(bus: Rc<RefCell<PciBus>>) -> Self {
        Self {
            mech: Rc::new(RefCell::new(PciConfigMechanism1::new())),
            bus,
        }
    }

    /// Registers the address port at 0xCF8 and the data window at 0xCFC..=0xCFF.
    pub fn register(self, io: &mut IoPortBus) {
        io.register(PCI_CFG_ADDR_PORT, Box::new(self.clone()));
        io.register_range(PCI_CFG_DATA_PORT, 4, Box::new(self));
    }
}

impl PortIoDevice for PciConfigPorts {
    fn read(&mut self, port: u16, size: u8) -> u32 {
        let mut bus = self.bus.borrow_mut();
        self.mech.borrow_mut().io_read(&mut bus, port, size)
    }

    fn write(&mut self, port: u16, size: u8, value: u32) {
        let mut bus = self.bus.borrow_mut();
        self.mech.borrow_mut().io_write(&mut bus, port, size, value);
    }
}
