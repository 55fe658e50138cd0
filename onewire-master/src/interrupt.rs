/// Suppresses interrupts around timing-critical windows.
///
/// Calls are never nested: every [`enter`](InterruptControl::enter) is
/// followed by exactly one [`exit`](InterruptControl::exit) before the next
/// `enter`.
pub trait InterruptControl {
    /// Disables interrupts.
    fn enter(&mut self);
    /// Restores the interrupt state saved by the matching `enter`.
    fn exit(&mut self);
}

/// Granularity at which a bus master suppresses interrupts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InterruptMasking {
    /// Interrupts are never touched.
    #[default]
    Disabled,
    /// A whole reset, bit, byte or byte sequence runs with interrupts off.
    Operation,
    /// Each time slot is masked on its own, and only the release-to-sample
    /// window of a reset. Interrupts are serviced between slots.
    Slot,
}

/// [`InterruptControl`] for platforms and tests without interrupts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMasking;

impl InterruptControl for NoMasking {
    fn enter(&mut self) {}

    fn exit(&mut self) {}
}

/// [`InterruptControl`] backed by the platform's `critical-section` implementation.
#[cfg(feature = "critical-section")]
#[derive(Default)]
pub struct CriticalSectionMasking {
    restore: Option<critical_section::RestoreState>,
}

#[cfg(feature = "critical-section")]
impl CriticalSectionMasking {
    /// Creates the controller with no critical section held.
    pub fn new() -> Self {
        Self { restore: None }
    }

    /// Whether a critical section is currently held.
    pub fn is_held(&self) -> bool {
        self.restore.is_some()
    }
}

#[cfg(feature = "critical-section")]
impl InterruptControl for CriticalSectionMasking {
    fn enter(&mut self) {
        if self.restore.is_none() {
            // SAFETY: the state is stored and handed back to `release` exactly once in `exit`.
            self.restore = Some(unsafe { critical_section::acquire() });
        }
    }

    fn exit(&mut self) {
        if let Some(restore) = self.restore.take() {
            // SAFETY: `restore` came from the `acquire` in `enter` and is released only once.
            unsafe { critical_section::release(restore) };
        }
    }
}

#[cfg(all(test, feature = "critical-section"))]
mod tests {
    use super::*;

    #[test]
    fn critical_section_is_released_on_exit() {
        let mut cs = CriticalSectionMasking::new();
        assert!(!cs.is_held());
        cs.enter();
        assert!(cs.is_held());
        cs.exit();
        assert!(!cs.is_held());
        // an unmatched exit is a no-op
        cs.exit();
        assert!(!cs.is_held());
    }
}
