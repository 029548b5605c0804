use std::collections::HashMap;

/// A device reachable through x86 port I/O.
pub trait PortIoDevice {
    fn read(&mut self, port: u16, size: u8) -> u32;
    fn write(&mut self, port: u16, size: u8, value: u32);

    /// Reset the device back to its power-on state.
    fn reset(&mut self) {}
}

struct RangeDevice {
    start: u16,
    len: u16,
    dev: Box<dyn PortIoDevice>,
}

impl RangeDevice {
    fn end_exclusive(&self) -> u32 {
        u32::from(self.start) + u32::from(self.len)
    }

    fn contains(&self, port: u16) -> bool {
        let p = u32::from(port);
        p >= u32::from(self.start) && p < self.end_exclusive()
    }
}

/// Legacy I/O port router.
///
/// Exact-port registrations take precedence over range registrations. Unmapped ports float the
/// bus high.
#[derive(Default)]
pub struct IoPortBus {
    devices: HashMap<u16, Box<dyn PortIoDevice>>,
    ranges: Vec<RangeDevice>,
}

impl IoPortBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` at a single port, replacing any previous handler for that port.
    pub fn register(&mut self, port: u16, device: Box<dyn PortIoDevice>) {
        if self.devices.insert(port, device).is_some() {
            tracing::debug!("replaced I/O port handler at {port:#x}");
        }
    }

    pub fn unregister(&mut self, port: u16) -> Option<Box<dyn PortIoDevice>> {
        self.devices.remove(&port)
    }

    pub fn is_registered(&self, port: u16) -> bool {
        self.devices.contains_key(&port) || self.find_range_index(port).is_some()
    }

    /// Registers one device over `start..start + len`.
    ///
    /// # Panics
    ///
    /// Panics if the range is empty, wraps past 0xFFFF, or overlaps another range device.
    pub fn register_range(&mut self, start: u16, len: u16, dev: Box<dyn PortIoDevice>) {
        assert!(len != 0, "I/O port range length must be non-zero");

        let end_exclusive = u32::from(start) + u32::from(len);
        assert!(
            end_exclusive <= 0x1_0000,
            "I/O port range wraps past 0xFFFF: start={start:#x} len={len:#x}"
        );

        let idx = self.ranges.partition_point(|r| r.start < start);
        if let Some(prev) = idx.checked_sub(1).and_then(|i| self.ranges.get(i)) {
            assert!(
                u32::from(start) >= prev.end_exclusive(),
                "overlapping I/O port ranges: new={start:#x} prev={:#x}",
                prev.start
            );
        }
        if let Some(next) = self.ranges.get(idx) {
            assert!(
                end_exclusive <= u32::from(next.start),
                "overlapping I/O port ranges: new={start:#x} next={:#x}",
                next.start
            );
        }

        self.ranges.insert(idx, RangeDevice { start, len, dev });
    }

    fn find_range_index(&self, port: u16) -> Option<usize> {
        let idx = self.ranges.partition_point(|r| r.start <= port);
        let cand = idx.checked_sub(1)?;
        self.ranges[cand].contains(port).then_some(cand)
    }

    fn device_mut(&mut self, port: u16) -> Option<&mut (dyn PortIoDevice + 'static)> {
        if self.devices.contains_key(&port) {
            return self.devices.get_mut(&port).map(|dev| &mut **dev);
        }
        let idx = self.find_range_index(port)?;
        Some(&mut *self.ranges[idx].dev)
    }

    pub fn read(&mut self, port: u16, size: u8) -> u32 {
        if !matches!(size, 1 | 2 | 4) {
            return 0xFFFF_FFFF;
        }
        match self.device_mut(port) {
            Some(dev) => dev.read(port, size),
            None => open_bus(size),
        }
    }

    pub fn write(&mut self, port: u16, size: u8, value: u32) {
        if !matches!(size, 1 | 2 | 4) {
            return;
        }
        if let Some(dev) = self.device_mut(port) {
            dev.write(port, size, value);
        }
    }

    pub fn read_u8(&mut self, port: u16) -> u8 {
        self.read(port, 1) as u8
    }

    pub fn write_u8(&mut self, port: u16, value: u8) {
        self.write(port, 1, u32::from(value));
    }

    pub fn reset(&mut self) {
        for dev in self.devices.values_mut() {
            dev.reset();
        }
        for range in self.ranges.iter_mut() {
            range.dev.reset();
        }
    }
}

fn open_bus(size: u8) -> u32 {
    match size {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => 0xFFFF_FFFF,
    }
}
