//! System Management RAM windows.
//!
//! An SMRAM window aliases a range of DRAM over a host address range (classically the VGA hole at
//! 0xA0000). The window is always reachable while the CPU runs in System Management Mode and, if
//! the chipset allows it, from normal mode as well.

use crate::memory::MemoryRange;
use std::cell::RefCell;
use std::rc::Rc;

/// Identifies a window allocated with [`SmramController::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SmramHandle(usize);

/// Which CPU mode an alias routing applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SmramAlias {
    Normal,
    Smm,
}

/// How accesses that hit an enabled window are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SmramAccessMode {
    /// Code and data both go to DRAM.
    #[default]
    Dram,
    /// Code fetches go to DRAM, data cycles go to the PCI bus.
    SplitCodeData,
}

/// Parameters of an enabled window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmramMapping {
    pub host_base: u64,
    pub ram_base: u64,
    pub size: u64,
    pub in_normal_mode: bool,
    pub in_smm: bool,
}

impl SmramMapping {
    pub const fn host_range(&self) -> MemoryRange {
        MemoryRange::new(self.host_base, self.size)
    }
}

/// The SMRAM subsystem as seen by a north bridge.
pub trait SmramController {
    /// Allocates a new, disabled window.
    fn add(&mut self) -> SmramHandle;

    /// Disables every window and drops alias routing overrides.
    fn disable_all(&mut self);

    fn enable(&mut self, handle: SmramHandle, mapping: SmramMapping);

    /// Overrides how accesses from `alias` mode to `range` are resolved.
    fn set_alias_mode(&mut self, alias: SmramAlias, range: MemoryRange, mode: SmramAccessMode);
}

#[derive(Debug, Default)]
struct SmramMapInner {
    windows: Vec<Option<SmramMapping>>,
    alias_modes: Vec<(SmramAlias, MemoryRange, SmramAccessMode)>,
    disable_all_calls: u64,
}

/// Cloneable in-tree [`SmramController`].
#[derive(Debug, Clone, Default)]
pub struct SmramMap {
    inner: Rc<RefCell<SmramMapInner>>,
}

impl SmramMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mapping of `handle`, `None` while disabled.
    pub fn window(&self, handle: SmramHandle) -> Option<SmramMapping> {
        self.inner.borrow().windows.get(handle.0).copied().flatten()
    }

    pub fn window_count(&self) -> usize {
        self.inner.borrow().windows.len()
    }

    /// Whether `addr` hits an enabled window from the given CPU mode.
    pub fn is_visible(&self, addr: u64, in_smm: bool) -> bool {
        self.inner.borrow().windows.iter().flatten().any(|w| {
            w.host_range().contains(addr) && if in_smm { w.in_smm } else { w.in_normal_mode }
        })
    }

    /// Access mode for `addr` from `alias` mode. The latest override covering `addr` wins.
    pub fn access_mode(&self, alias: SmramAlias, addr: u64) -> SmramAccessMode {
        self.inner
            .borrow()
            .alias_modes
            .iter()
            .rev()
            .find(|(a, range, _)| *a == alias && range.contains(addr))
            .map(|(_, _, mode)| *mode)
            .unwrap_or_default()
    }

    pub fn disable_all_calls(&self) -> u64 {
        self.inner.borrow().disable_all_calls
    }
}

impl SmramController for SmramMap {
    fn add(&mut self) -> SmramHandle {
        let mut inner = self.inner.borrow_mut();
        inner.windows.push(None);
        SmramHandle(inner.windows.len() - 1)
    }

    fn disable_all(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.windows.iter_mut().for_each(|w| *w = None);
        inner.alias_modes.clear();
        inner.disable_all_calls += 1;
    }

    fn enable(&mut self, handle: SmramHandle, mapping: SmramMapping) {
        let mut inner = self.inner.borrow_mut();
        let Some(slot) = inner.windows.get_mut(handle.0) else {
            tracing::debug!(?handle, "enable of unknown SMRAM window ignored");
            return;
        };
        *slot = Some(mapping);
    }

    fn set_alias_mode(&mut self, alias: SmramAlias, range: MemoryRange, mode: SmramAccessMode) {
        self.inner.borrow_mut().alias_modes.push((alias, range, mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(in_normal_mode: bool) -> SmramMapping {
        SmramMapping {
            host_base: 0xA0000,
            ram_base: 0xA0000,
            size: 0x20000,
            in_normal_mode,
            in_smm: true,
        }
    }

    #[test]
    fn new_windows_start_disabled() {
        let mut smram = SmramMap::new();
        let handle = smram.add();
        assert_eq!(smram.window(handle), None);
        assert!(!smram.is_visible(0xA0000, true));
    }

    #[test]
    fn visibility_follows_cpu_mode() {
        let mut smram = SmramMap::new();
        let handle = smram.add();

        smram.enable(handle, mapping(false));
        assert!(smram.is_visible(0xA0000, true));
        assert!(smram.is_visible(0xBFFFF, true));
        assert!(!smram.is_visible(0xC0000, true));
        assert!(!smram.is_visible(0xA0000, false));

        smram.enable(handle, mapping(true));
        assert!(smram.is_visible(0xA0000, false));
    }

    #[test]
    fn disable_all_clears_windows_and_alias_modes() {
        let mut smram = SmramMap::new();
        let handle = smram.add();
        let range = MemoryRange::new(0xA0000, 0x20000);
        smram.enable(handle, mapping(true));
        smram.set_alias_mode(SmramAlias::Smm, range, SmramAccessMode::SplitCodeData);
        assert_eq!(
            smram.access_mode(SmramAlias::Smm, 0xA8000),
            SmramAccessMode::SplitCodeData
        );
        assert_eq!(smram.access_mode(SmramAlias::Normal, 0xA8000), SmramAccessMode::Dram);

        smram.disable_all();
        assert_eq!(smram.window(handle), None);
        assert_eq!(smram.access_mode(SmramAlias::Smm, 0xA8000), SmramAccessMode::Dram);
        assert_eq!(smram.disable_all_calls(), 1);
        assert_eq!(smram.window_count(), 1);
    }
}
