//! System control port A (0x92): fast A20 gate and fast CPU reset.

use hb4_platform::chipset::A20GateHandle;
use hb4_platform::io::PortIoDevice;
use hb4_platform::reset::{PlatformResetSink, ResetKind};

pub const A20_GATE_PORT: u16 = 0x92;

const FAST_RESET: u8 = 0x01;
const A20_ENABLE: u8 = 0x02;

pub struct A20Gate {
    a20: A20GateHandle,
    reset: Option<Box<dyn PlatformResetSink>>,
    value: u8,
}

impl A20Gate {
    pub fn new(a20: A20GateHandle) -> Self {
        let value = if a20.enabled() { A20_ENABLE } else { 0 };
        Self {
            a20,
            reset: None,
            value,
        }
    }

    pub fn with_reset_sink(a20: A20GateHandle, reset: Box<dyn PlatformResetSink>) -> Self {
        let mut dev = Self::new(a20);
        dev.reset = Some(reset);
        dev
    }

    fn read_value(&self) -> u8 {
        // Bit 1 reports the live line; the keyboard controller can also drive it.
        let a20_bit = if self.a20.enabled() { A20_ENABLE } else { 0 };
        (self.value & !A20_ENABLE) | a20_bit
    }
}

impl PortIoDevice for A20Gate {
    fn read(&mut self, _port: u16, _size: u8) -> u32 {
        u32::from(self.read_value())
    }

    fn write(&mut self, _port: u16, _size: u8, value: u32) {
        let value = value as u8;

        self.a20.set_enabled(value & A20_ENABLE != 0);

        if value & FAST_RESET != 0 {
            tracing::debug!("port 0x92 fast reset pulse");
            match self.reset.as_mut() {
                Some(sink) => sink.request_reset(ResetKind::Cpu),
                None => tracing::debug!("no reset sink attached; pulse dropped"),
            }
        }

        // Bit 0 is a pulse and always reads back clear.
        self.value = value & !FAST_RESET;
    }

    fn reset(&mut self) {
        self.value = 0;
        self.a20.set_enabled(false);
    }
}
