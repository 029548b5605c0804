use std::cell::Cell;
use std::rc::Rc;

/// Reset request kind raised by chipset devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Warm reset of the CPU only (port 0x92 fast reset, keyboard controller pulse).
    Cpu,
    /// Full machine reset: CPU, devices and firmware re-entry.
    System,
}

/// Receives reset requests from device models.
///
/// A device must not reset the machine from inside its own I/O handler since the bus that
/// dispatched the access is still borrowed. It reports the request here and the platform applies
/// it once the access has completed.
pub trait PlatformResetSink {
    fn request_reset(&mut self, kind: ResetKind);
}

impl<F> PlatformResetSink for F
where
    F: FnMut(ResetKind),
{
    fn request_reset(&mut self, kind: ResetKind) {
        self(kind);
    }
}

/// Cloneable single-slot reset mailbox.
///
/// Holds at most one pending request. When several arrive before the platform drains the latch,
/// the strongest one is kept ([`ResetKind::System`] over [`ResetKind::Cpu`]).
#[derive(Debug, Clone, Default)]
pub struct ResetLatch {
    pending: Rc<Cell<Option<ResetKind>>>,
}

impl ResetLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<ResetKind> {
        self.pending.get()
    }

    /// Returns the pending request and empties the latch.
    pub fn take(&self) -> Option<ResetKind> {
        self.pending.take()
    }

    fn merge(&self, kind: ResetKind) {
        let merged = match self.pending.get() {
            Some(ResetKind::System) => ResetKind::System,
            _ => kind,
        };
        self.pending.set(Some(merged));
    }
}

impl PlatformResetSink for ResetLatch {
    fn request_reset(&mut self, kind: ResetKind) {
        tracing::debug!(?kind, "reset requested");
        self.merge(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_reset_is_not_downgraded_by_later_cpu_reset() {
        let latch = ResetLatch::new();
        let mut sink = latch.clone();

        sink.request_reset(ResetKind::System);
        sink.request_reset(ResetKind::Cpu);
        assert_eq!(latch.take(), Some(ResetKind::System));
        assert_eq!(latch.peek(), None);
    }

    #[test]
    fn cpu_reset_upgrades_to_system() {
        let latch = ResetLatch::new();
        let mut sink = latch.clone();

        sink.request_reset(ResetKind::Cpu);
        assert_eq!(latch.peek(), Some(ResetKind::Cpu));
        sink.request_reset(ResetKind::System);
        assert_eq!(latch.take(), Some(ResetKind::System));
    }

    #[test]
    fn closures_are_reset_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |kind: ResetKind| seen.push(kind);
            sink.request_reset(ResetKind::Cpu);
        }
        assert_eq!(seen, vec![ResetKind::Cpu]);
    }
}
