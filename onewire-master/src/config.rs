use crate::{InterruptMasking, Pull};

/// Bus master configuration, fixed at construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub(crate) pull: Pull,
    pub(crate) masking: InterruptMasking,
}

impl Config {
    /// Creates the default configuration: external pull-up, interrupts untouched.
    pub const fn new() -> Self {
        Self {
            pull: Pull::External,
            masking: InterruptMasking::Disabled,
        }
    }

    /// Sets how the released bus is pulled high.
    pub const fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    /// Sets the interrupt suppression granularity.
    pub const fn with_masking(mut self, masking: InterruptMasking) -> Self {
        self.masking = masking;
        self
    }

    /// Configured pull mode.
    pub const fn pull(&self) -> Pull {
        self.pull
    }

    /// Configured interrupt suppression granularity.
    pub const fn masking(&self) -> InterruptMasking {
        self.masking
    }
}
