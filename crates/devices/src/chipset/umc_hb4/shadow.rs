//! Shadow RAM routing derived from registers 54h/55h.

use super::regs::{ShadowLower, ShadowUpper};
use hb4_platform::memory::{MemoryRange, MemoryRouting, ReadRoute, RegionState, WriteRoute};

/// System BIOS segment, governed by register 55h alone.
pub const BIOS_SEGMENT: MemoryRange = MemoryRange::new(0xE0000, 0x20000);
/// VGA BIOS segment.
pub const VGA_BIOS_SEGMENT: MemoryRange = MemoryRange::new(0xC0000, 0x8000);

/// Option ROM segments follow the VGA BIOS at a 16KiB stride. Each update covers 32KiB; the
/// upper half is overwritten by the next segment, and the last one carries DC000-DFFFF along.
const OPTION_ROM_BASE: u64 = 0xC8000;
const OPTION_ROM_STRIDE: u64 = 0x4000;
const OPTION_ROM_UPDATE_LEN: u64 = 0x8000;

const OPTION_ROM_ENABLES: [ShadowLower; 5] = [
    ShadowLower::C8000,
    ShadowLower::CC000,
    ShadowLower::D0000,
    ShadowLower::D4000,
    ShadowLower::D8000,
];

/// Ordered routing updates for one shadow recompute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowPlan {
    updates: Vec<(MemoryRange, RegionState)>,
}

impl ShadowPlan {
    pub fn from_registers(lower: u8, upper: u8) -> Self {
        let lower = ShadowLower::from_bits_truncate(lower);
        let upper = ShadowUpper::from_bits_truncate(upper);

        let write = if upper.contains(ShadowUpper::WRITE_PROTECT) {
            WriteRoute::External
        } else {
            WriteRoute::Internal
        };
        let shadowed = RegionState::new(ReadRoute::Internal, write);
        let pick = |enabled: bool| {
            if enabled {
                shadowed
            } else {
                RegionState::PASS_THROUGH
            }
        };

        let read = if upper.contains(ShadowUpper::E0000) {
            ReadRoute::Internal
        } else {
            ReadRoute::External
        };
        let mut updates = vec![(BIOS_SEGMENT, RegionState::new(read, write))];

        // With the master bit clear, C0000-DFFFF keeps whatever routing it had.
        if lower.contains(ShadowLower::ENABLE) {
            updates.push((VGA_BIOS_SEGMENT, pick(lower.contains(ShadowLower::C0000))));
            for (i, enable) in OPTION_ROM_ENABLES.iter().enumerate() {
                let range = MemoryRange::new(
                    OPTION_ROM_BASE + i as u64 * OPTION_ROM_STRIDE,
                    OPTION_ROM_UPDATE_LEN,
                );
                updates.push((range, pick(lower.contains(*enable))));
            }
        }

        Self { updates }
    }

    pub fn updates(&self) -> &[(MemoryRange, RegionState)] {
        &self.updates
    }

    /// Pushes every update to `memory`, then flushes cached translations.
    pub fn apply(&self, memory: &mut dyn MemoryRouting) {
        for (range, state) in &self.updates {
            memory.set_region_state(*range, *state);
        }
        memory.flush_translation_cache();
    }
}
