//! UMC UM8881 ("HB4", Super Energy Star Green) host bridge.
//!
//! Besides identity and DRAM bookkeeping registers, three register groups have side effects:
//! - 50h: external cache control, forwarded to the CPU core.
//! - 54h/55h: shadow RAM routing for C0000-FFFFF ([`shadow`]).
//! - 60h: SMRAM window control ([`smram`]).
//!
//! Routing state is never cached here. Each write to a routing register rebuilds the full plan
//! from the register bank and pushes it to the platform.

pub mod regs;
pub mod shadow;
pub mod smram;

use self::regs::{CacheControl, WritePolicy, CONFIG_SPACE_LEN};
use self::shadow::ShadowPlan;
use self::smram::SmramPlan;
use crate::a20_gate::{A20Gate, A20_GATE_PORT};
use crate::pci::{PciBdf, PciBus, PciBusError, PciConfigDevice};
use hb4_platform::chipset::A20GateHandle;
use hb4_platform::cpu::CpuCacheControl;
use hb4_platform::io::IoPortBus;
use hb4_platform::memory::MemoryRouting;
use hb4_platform::reset::PlatformResetSink;
use hb4_platform::smram::{SmramController, SmramHandle};

/// Platform collaborators the bridge drives.
pub struct Hb4Runtime {
    pub memory: Box<dyn MemoryRouting>,
    pub smram: Box<dyn SmramController>,
    pub cpu: Box<dyn CpuCacheControl>,
}

#[derive(Debug, Clone)]
pub struct Hb4Config {
    /// Slot on the primary bus.
    pub bdf: PciBdf,
    /// Install the port 0x92 fast A20 / fast reset device alongside the bridge.
    pub port92: bool,
}

impl Default for Hb4Config {
    fn default() -> Self {
        Self {
            bdf: UmcHb4::DEFAULT_BDF,
            port92: true,
        }
    }
}

pub struct UmcHb4 {
    rt: Hb4Runtime,
    smram_window: SmramHandle,
    regs: [u8; CONFIG_SPACE_LEN],
}

impl UmcHb4 {
    pub const DEFAULT_BDF: PciBdf = PciBdf::new(0, 0x10, 0);

    /// Creates the bridge in its power-on state.
    ///
    /// Allocates the SMRAM window from `rt.smram` and runs a reset, so the platform has received
    /// a complete shadow and SMRAM configuration by the time this returns.
    pub fn new(mut rt: Hb4Runtime) -> Self {
        let smram_window = rt.smram.add();
        let mut dev = Self {
            rt,
            smram_window,
            regs: [0; CONFIG_SPACE_LEN],
        };
        dev.reset();
        dev
    }

    /// Creates the bridge and wires it into a machine: the PCI slot from `config` and, if
    /// enabled, the fast A20 / reset port.
    ///
    /// Fails without touching the platform if the slot is taken.
    pub fn install(
        config: &Hb4Config,
        rt: Hb4Runtime,
        pci: &mut PciBus,
        io: &mut IoPortBus,
        a20: A20GateHandle,
        reset: Box<dyn PlatformResetSink>,
    ) -> Result<(), PciBusError> {
        if pci.is_occupied(config.bdf) {
            return Err(PciBusError::SlotOccupied(config.bdf.slot()));
        }

        pci.add_device(config.bdf, Box::new(Self::new(rt)))?;
        if config.port92 {
            io.register(A20_GATE_PORT, Box::new(A20Gate::with_reset_sink(a20, reset)));
        }
        tracing::debug!(bdf = %config.bdf, port92 = config.port92, "UM8881 installed");
        Ok(())
    }

    /// Reads one configuration byte. Offsets past the bank read as zero.
    pub fn read(&self, _function: u8, offset: u8) -> u8 {
        self.regs.get(usize::from(offset)).copied().unwrap_or(0)
    }

    /// Writes one configuration byte. Offsets past the bank are dropped like any other
    /// unimplemented register.
    pub fn write(&mut self, _function: u8, offset: u8, value: u8) {
        tracing::trace!("UM8881 config write {offset:#04x} <- {value:#04x}");

        let slot = usize::from(offset);
        match regs::write_policy(offset) {
            WritePolicy::Plain => self.regs[slot] = value,
            WritePolicy::StatusClear => {
                self.regs[slot] = regs::status_after_write(self.regs[slot], value);
            }
            WritePolicy::CacheControl => {
                self.regs[slot] = regs::cache_control_after_write(value);
                self.rt.cpu.set_external_cache_enabled(value & 0x80 != 0);
                self.rt.cpu.update_wait_states();
            }
            WritePolicy::Shadow => {
                self.regs[slot] = value;
                self.recompute_shadow();
            }
            WritePolicy::Smram => {
                self.regs[slot] = value;
                self.recompute_smram();
            }
            WritePolicy::ReadOnly => {
                tracing::debug!("write to unimplemented UM8881 register {offset:#04x} dropped");
            }
        }
    }

    /// Re-asserts power-on defaults and pushes the resulting routing to the platform.
    ///
    /// Bytes outside the default set keep their values, so shadow settings survive a warm reset.
    pub fn reset(&mut self) {
        for &(offset, value) in regs::RESET_DEFAULTS {
            self.regs[usize::from(offset)] = value;
        }
        self.recompute_shadow();
        self.write(0, regs::SMRAM_CONTROL, regs::SMRAM_CONTROL_RESET);
    }

    /// Releases the bridge. The SMRAM window stays owned by the SMRAM subsystem.
    pub fn close(self) {
        tracing::debug!("UM8881 closed");
    }

    /// Shadow routing implied by the current register bank.
    pub fn shadow_plan(&self) -> ShadowPlan {
        ShadowPlan::from_registers(
            self.regs[usize::from(regs::SHADOW_LOWER)],
            self.regs[usize::from(regs::SHADOW_UPPER)],
        )
    }

    /// SMRAM configuration implied by the current register bank.
    pub fn smram_plan(&self) -> SmramPlan {
        SmramPlan::from_register(self.regs[usize::from(regs::SMRAM_CONTROL)])
    }

    pub fn cache_control(&self) -> CacheControl {
        CacheControl::from_register(self.regs[usize::from(regs::CACHE_CONTROL)])
    }

    pub fn registers(&self) -> &[u8; CONFIG_SPACE_LEN] {
        &self.regs
    }

    pub fn recompute_shadow(&mut self) {
        let plan = self.shadow_plan();
        tracing::trace!(updates = plan.updates().len(), "UM8881 shadow recompute");
        plan.apply(&mut *self.rt.memory);
    }

    pub fn recompute_smram(&mut self) {
        let plan = self.smram_plan();
        tracing::trace!(
            in_normal_mode = plan.mapping.in_normal_mode,
            split = plan.split_aliases.len(),
            "UM8881 SMRAM recompute"
        );
        plan.apply(&mut *self.rt.smram, self.smram_window);
    }
}

impl PciConfigDevice for UmcHb4 {
    fn config_read(&mut self, function: u8, offset: u8) -> u8 {
        self.read(function, offset)
    }

    fn config_write(&mut self, function: u8, offset: u8, value: u8) {
        self.write(function, offset, value);
    }

    fn config_space_len(&self) -> usize {
        CONFIG_SPACE_LEN
    }

    fn reset(&mut self) {
        UmcHb4::reset(self);
    }

    fn close(self: Box<Self>) {
        (*self).close();
    }
}
