use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use umc_hb4::devices::a20_gate::A20_GATE_PORT;
use umc_hb4::devices::pci::{PciBus, PciConfigPorts, PCI_CFG_ADDR_PORT, PCI_CFG_DATA_PORT};
use umc_hb4::platform::chipset::A20GateHandle;
use umc_hb4::platform::cpu::ExternalCacheState;
use umc_hb4::platform::io::IoPortBus;
use umc_hb4::platform::memory::{ReadRoute, RegionState, ShadowRouting, WriteRoute};
use umc_hb4::platform::reset::{ResetKind, ResetLatch};
use umc_hb4::platform::smram::SmramMap;
use umc_hb4::{Hb4Config, Hb4Runtime, UmcHb4};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A board with only the host bridge, the config ports and port 0x92 populated.
struct Board {
    io: IoPortBus,
    pci: Rc<RefCell<PciBus>>,
    memory: ShadowRouting,
    smram: SmramMap,
    cpu: ExternalCacheState,
    a20: A20GateHandle,
    resets: ResetLatch,
}

impl Board {
    fn new() -> anyhow::Result<Self> {
        let memory = ShadowRouting::new();
        let smram = SmramMap::new();
        let cpu = ExternalCacheState::new();
        let a20 = A20GateHandle::new();
        let resets = ResetLatch::new();

        let pci = Rc::new(RefCell::new(PciBus::new()));
        let mut io = IoPortBus::new();
        UmcHb4::install(
            &Hb4Config::default(),
            Hb4Runtime {
                memory: Box::new(memory.clone()),
                smram: Box::new(smram.clone()),
                cpu: Box::new(cpu.clone()),
            },
            &mut pci.borrow_mut(),
            &mut io,
            a20.clone(),
            Box::new(resets.clone()),
        )?;
        PciConfigPorts::new(pci.clone()).register(&mut io);

        Ok(Self {
            io,
            pci,
            memory,
            smram,
            cpu,
            a20,
            resets,
        })
    }

    fn select(&mut self, offset: u8) {
        let bdf = u32::from(UmcHb4::DEFAULT_BDF.pack_u16());
        self.io.write(
            PCI_CFG_ADDR_PORT,
            4,
            0x8000_0000 | (bdf << 8) | u32::from(offset & 0xFC),
        );
    }

    fn read8(&mut self, offset: u8) -> u8 {
        self.select(offset);
        self.io.read(PCI_CFG_DATA_PORT + u16::from(offset & 3), 1) as u8
    }

    fn write8(&mut self, offset: u8, value: u8) {
        self.select(offset);
        self.io
            .write(PCI_CFG_DATA_PORT + u16::from(offset & 3), 1, u32::from(value));
    }

    fn write16(&mut self, offset: u8, value: u16) {
        self.select(offset);
        self.io
            .write(PCI_CFG_DATA_PORT + u16::from(offset & 2), 2, u32::from(value));
    }

    /// Applies a pending reset request the way a machine loop would after an I/O exit.
    fn service_reset(&mut self) -> Option<ResetKind> {
        let kind = self.resets.take()?;
        self.pci.borrow_mut().reset();
        self.io.reset();
        Some(kind)
    }
}

fn shadowed(write_protect: bool) -> RegionState {
    let write = if write_protect {
        WriteRoute::External
    } else {
        WriteRoute::Internal
    };
    RegionState::new(ReadRoute::Internal, write)
}

/// Register 54h bit governing the 16KiB granule at `addr` in C0000-DFFFF.
fn lower_enable_bit(addr: u64) -> u8 {
    match addr {
        0xC0000..=0xC7FFF => 1,
        0xC8000..=0xCBFFF => 2,
        0xCC000..=0xCFFFF => 3,
        0xD0000..=0xD3FFF => 4,
        0xD4000..=0xD7FFF => 5,
        _ => 6,
    }
}

#[test]
fn bios_post_sequence() -> anyhow::Result<()> {
    init_tracing();
    let mut board = Board::new()?;

    // Shadow the system BIOS: copy with reads from ROM, then run from write-protected RAM.
    board.write8(0x55, 0x00);
    assert_eq!(
        board.memory.state_at(0xF0000),
        Some(RegionState::new(ReadRoute::External, WriteRoute::Internal))
    );
    board.write8(0x55, 0xC0);
    assert_eq!(board.memory.state_at(0xF0000), Some(shadowed(true)));

    // Shadow the VGA BIOS; the option ROM space stays on the bus.
    board.write8(0x54, 0x03);
    assert_eq!(board.memory.state_at(0xC0000), Some(shadowed(true)));
    assert_eq!(board.memory.state_at(0xC8000), Some(RegionState::PASS_THROUGH));

    // Open SMRAM to load the handler, then close it again.
    board.write8(0x60, 0x01);
    assert!(board.smram.is_visible(0xA8000, false));
    board.write8(0x60, 0x00);
    assert!(!board.smram.is_visible(0xA8000, false));
    assert!(board.smram.is_visible(0xA8000, true));

    // Enable the L2 cache.
    board.write8(0x50, 0xC0);
    assert!(board.cpu.enabled());
    assert_eq!(board.read8(0x50), 0xC4);

    // Gate A20 on through port 0x92.
    board.io.write_u8(A20_GATE_PORT, 0x02);
    assert!(board.a20.enabled());
    Ok(())
}

#[test]
fn fast_reset_through_port92_reapplies_chipset_defaults() -> anyhow::Result<()> {
    init_tracing();
    let mut board = Board::new()?;
    board.write8(0x54, 0x03);
    board.write8(0x55, 0x80);
    board.write8(0x5C, 0x00);
    board.write8(0x60, 0x01);
    board.io.write_u8(A20_GATE_PORT, 0x02);

    board.io.write_u8(A20_GATE_PORT, 0x03);
    assert_eq!(board.service_reset(), Some(ResetKind::Cpu));
    assert_eq!(board.service_reset(), None);

    assert_eq!(board.read8(0x5C), 0xC0);
    assert_eq!(board.read8(0x60), 0x20);
    assert!(!board.smram.is_visible(0xA0000, false));
    // Shadow control survives and is pushed again.
    assert_eq!(board.read8(0x54), 0x03);
    assert_eq!(board.memory.state_at(0xC0000), Some(shadowed(false)));
    assert_eq!(board.memory.state_at(0xE0000), Some(shadowed(false)));
    assert!(!board.a20.enabled());
    Ok(())
}

#[test]
fn word_write_to_shadow_registers_applies_both() -> anyhow::Result<()> {
    let mut board = Board::new()?;
    // 54h = 0x41 (master + D8000), 55h = 0x80.
    board.write16(0x54, 0x8041);
    assert_eq!(board.read8(0x54), 0x41);
    assert_eq!(board.read8(0x55), 0x80);
    assert_eq!(board.memory.state_at(0xDC000), Some(shadowed(false)));
    assert_eq!(board.memory.state_at(0xE0000), Some(shadowed(false)));
    Ok(())
}

#[test]
fn other_functions_alias_function_zero() -> anyhow::Result<()> {
    let mut board = Board::new()?;
    let bdf = u32::from(UmcHb4::DEFAULT_BDF.pack_u16()) | 0x5;
    board
        .io
        .write(PCI_CFG_ADDR_PORT, 4, 0x8000_0000 | (bdf << 8));
    assert_eq!(board.io.read(PCI_CFG_DATA_PORT, 4), 0x8881_1060);
    Ok(())
}

proptest! {
    #[test]
    fn shadow_routing_matches_registers(r54: u8, r55: u8) {
        let mut board = Board::new().unwrap();
        board.write8(0x54, r54);
        board.write8(0x55, r55);

        let wp = r55 & 0x40 != 0;
        let mut addr = 0xC0000u64;
        while addr < 0x100000 {
            let expected = if addr >= 0xE0000 {
                let read = if r55 & 0x80 != 0 { ReadRoute::Internal } else { ReadRoute::External };
                RegionState::new(read, shadowed(wp).write)
            } else if r54 & 0x01 == 0 || r54 & (1 << lower_enable_bit(addr)) == 0 {
                RegionState::PASS_THROUGH
            } else {
                shadowed(wp)
            };
            prop_assert_eq!(board.memory.state_at(addr), Some(expected), "addr {:#x}", addr);
            addr += 0x4000;
        }
    }

    #[test]
    fn status_high_byte_only_loses_bits(values in proptest::collection::vec(any::<u8>(), 1..8)) {
        let mut board = Board::new().unwrap();
        for v in values {
            let before = board.read8(0x07);
            board.write8(0x07, v);
            let after = board.read8(0x07);
            prop_assert_eq!(after, before & !(v & 0xF9));
            prop_assert_eq!(after & 0x06, 0x02);
        }
    }

    #[test]
    fn unimplemented_offsets_read_zero(offset in 0x62u8..0x80, value: u8) {
        let mut board = Board::new().unwrap();
        board.write8(offset, value);
        prop_assert_eq!(board.read8(offset), 0);
    }

    #[test]
    fn cache_control_through_ports(value: u8) {
        let mut board = Board::new().unwrap();
        board.write8(0x50, value);
        prop_assert_eq!(board.read8(0x50), (value & 0xF8) | 0x04);
        prop_assert_eq!(board.cpu.enabled(), value & 0x80 != 0);
    }
}
