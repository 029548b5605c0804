//! Legacy option-ROM / BIOS shadow routing.
//!
//! The 0xC0000..0x100000 window of a PC is backed both by RAM and by whatever the expansion bus
//! decodes there (option ROMs, the system BIOS). A north bridge decides, per address window and
//! per direction, which of the two services an access.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Start of the shadowable legacy window.
pub const SHADOW_WINDOW_BASE: u64 = 0x000C_0000;
/// End (exclusive) of the shadowable legacy window.
pub const SHADOW_WINDOW_END: u64 = 0x0010_0000;
/// Tracking granularity of [`ShadowRouting`].
pub const SHADOW_GRANULE: u64 = 0x4000;

const GRANULE_COUNT: usize = ((SHADOW_WINDOW_END - SHADOW_WINDOW_BASE) / SHADOW_GRANULE) as usize;

/// Half-open physical address range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryRange {
    start: u64,
    len: u64,
}

impl MemoryRange {
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    pub const fn start(&self) -> u64 {
        self.start
    }

    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn end(&self) -> u64 {
        self.start + self.len
    }

    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }
}

impl fmt::Debug for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.end())
    }
}

/// Where reads of a window are serviced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadRoute {
    /// Shadow RAM.
    Internal,
    /// Forwarded to the expansion bus (ROM).
    #[default]
    External,
}

/// Where writes to a window are serviced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteRoute {
    /// Shadow RAM.
    Internal,
    /// Forwarded to the expansion bus, which usually drops them.
    #[default]
    External,
}

/// Routing of one window. The default is full pass-through, the PC power-on state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionState {
    pub read: ReadRoute,
    pub write: WriteRoute,
}

impl RegionState {
    pub const PASS_THROUGH: Self = Self {
        read: ReadRoute::External,
        write: WriteRoute::External,
    };

    pub const fn new(read: ReadRoute, write: WriteRoute) -> Self {
        Self { read, write }
    }
}

/// The physical memory subsystem as seen by a north bridge.
pub trait MemoryRouting {
    /// Applies `state` to `range` for every access width.
    fn set_region_state(&mut self, range: MemoryRange, state: RegionState);

    /// Drops cached guest translations so later accesses observe the new routing.
    fn flush_translation_cache(&mut self);
}

#[derive(Debug)]
struct ShadowRoutingInner {
    granules: [RegionState; GRANULE_COUNT],
    updates: u64,
    flushes: u64,
}

/// Cloneable routing table for the 0xC0000..0x100000 window.
///
/// Clones share state: hand one to the chipset and keep another to inspect the result.
#[derive(Debug, Clone)]
pub struct ShadowRouting {
    inner: Rc<RefCell<ShadowRoutingInner>>,
}

impl Default for ShadowRouting {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowRouting {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ShadowRoutingInner {
                granules: [RegionState::PASS_THROUGH; GRANULE_COUNT],
                updates: 0,
                flushes: 0,
            })),
        }
    }

    /// Routing for `addr`, or `None` outside the shadow window.
    pub fn state_at(&self, addr: u64) -> Option<RegionState> {
        let index = granule_index(addr)?;
        Some(self.inner.borrow().granules[index])
    }

    pub fn update_count(&self) -> u64 {
        self.inner.borrow().updates
    }

    pub fn flush_count(&self) -> u64 {
        self.inner.borrow().flushes
    }
}

fn granule_index(addr: u64) -> Option<usize> {
    if !(SHADOW_WINDOW_BASE..SHADOW_WINDOW_END).contains(&addr) {
        return None;
    }
    Some(((addr - SHADOW_WINDOW_BASE) / SHADOW_GRANULE) as usize)
}

impl MemoryRouting for ShadowRouting {
    fn set_region_state(&mut self, range: MemoryRange, state: RegionState) {
        debug_assert_eq!(range.start() % SHADOW_GRANULE, 0);
        debug_assert_eq!(range.len() % SHADOW_GRANULE, 0);

        let mut inner = self.inner.borrow_mut();
        inner.updates += 1;

        let start = range.start().max(SHADOW_WINDOW_BASE);
        let end = range.end().min(SHADOW_WINDOW_END);
        if start >= end {
            tracing::debug!(?range, "routing update outside the shadow window ignored");
            return;
        }
        let first = ((start - SHADOW_WINDOW_BASE) / SHADOW_GRANULE) as usize;
        let last = ((end - SHADOW_WINDOW_BASE).div_ceil(SHADOW_GRANULE)) as usize;
        for granule in &mut inner.granules[first..last] {
            *granule = state;
        }
    }

    fn flush_translation_cache(&mut self) {
        self.inner.borrow_mut().flushes += 1;
    }
}
