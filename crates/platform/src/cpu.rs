use std::cell::Cell;
use std::rc::Rc;

/// CPU-core knobs a chipset can turn.
pub trait CpuCacheControl {
    /// Sets the external (L2) cache enable flag.
    fn set_external_cache_enabled(&mut self, enabled: bool);

    /// Recomputes memory wait states from the current cache configuration.
    fn update_wait_states(&mut self);
}

/// Cloneable in-tree [`CpuCacheControl`].
#[derive(Debug, Clone, Default)]
pub struct ExternalCacheState {
    enabled: Rc<Cell<bool>>,
    wait_state_updates: Rc<Cell<u64>>,
}

impl ExternalCacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn wait_state_updates(&self) -> u64 {
        self.wait_state_updates.get()
    }
}

impl CpuCacheControl for ExternalCacheState {
    fn set_external_cache_enabled(&mut self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn update_wait_states(&mut self) {
        self.wait_state_updates.set(self.wait_state_updates.get() + 1);
    }
}
