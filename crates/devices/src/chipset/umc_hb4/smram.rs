//! SMRAM window derived from register 60h.

use super::regs::SmramControl;
use hb4_platform::memory::MemoryRange;
use hb4_platform::smram::{
    SmramAccessMode, SmramAlias, SmramController, SmramHandle, SmramMapping,
};

/// The window is hardwired to the VGA hole.
pub const SMRAM_RANGE: MemoryRange = MemoryRange::new(0xA0000, 0x20000);

/// Window parameters and alias overrides for one SMRAM recompute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmramPlan {
    pub mapping: SmramMapping,
    pub split_aliases: Vec<SmramAlias>,
}

impl SmramPlan {
    pub fn from_register(value: u8) -> Self {
        let control = SmramControl::from_bits_truncate(value);
        let local = control.contains(SmramControl::LOCAL_ACCESS);

        let mapping = SmramMapping {
            host_base: SMRAM_RANGE.start(),
            ram_base: SMRAM_RANGE.start(),
            size: SMRAM_RANGE.len(),
            in_normal_mode: local,
            // Always reachable from SMM.
            in_smm: true,
        };

        let mut split_aliases = Vec::new();
        if control.contains(SmramControl::SPLIT_CODE_DATA) {
            if local {
                split_aliases.push(SmramAlias::Normal);
            }
            split_aliases.push(SmramAlias::Smm);
        }

        Self {
            mapping,
            split_aliases,
        }
    }

    /// Disables every window, then enables `handle` with this plan.
    pub fn apply(&self, smram: &mut dyn SmramController, handle: SmramHandle) {
        smram.disable_all();
        smram.enable(handle, self.mapping);
        for alias in &self.split_aliases {
            smram.set_alias_mode(*alias, SMRAM_RANGE, SmramAccessMode::SplitCodeData);
        }
    }
}
