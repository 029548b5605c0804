use std::cell::Cell;
use std::rc::Rc;

/// Shared view of the A20 address line.
///
/// The line is owned by the platform; devices that can drive it (port 0x92, the keyboard
/// controller) hold a clone of the handle.
#[derive(Debug, Clone, Default)]
pub struct A20GateHandle {
    enabled: Rc<Cell<bool>>,
}

impl A20GateHandle {
    /// Creates a handle with the line masked (real-mode wraparound), matching PC power-on.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.replace(enabled) != enabled {
            tracing::trace!(enabled, "A20 line changed");
        }
    }
}
