use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

/// Busy-wait [`DelayNs`] calibrated from the core clock rate.
///
/// Never yields; the calling context is occupied for the whole delay. The
/// loop body cost is given in core cycles per iteration and depends on the
/// target and optimization level, so measure it once for a new target.
///
/// Iteration rates are computed once at construction and rounded up, so a
/// delay is never shorter than requested. A call then costs one `u32`
/// multiply before the loop starts.
#[derive(Debug, Clone, Copy)]
pub struct SpinDelay {
    clock: HertzU32,
    cycles_per_iteration: u32,
    per_us: u32,
    per_kibi_ns: u32,
    max_us: u32,
}

impl SpinDelay {
    /// Cycles one iteration of the spin loop takes on a small 32-bit in-order core.
    pub const DEFAULT_CYCLES_PER_ITERATION: u32 = 4;

    /// Creates a delay for a core running at `clock`.
    pub fn new(clock: HertzU32) -> Self {
        Self::calibrated(clock, Self::DEFAULT_CYCLES_PER_ITERATION)
    }

    /// Sets the measured cost of one loop iteration.
    pub fn with_cycles_per_iteration(self, cycles: u32) -> Self {
        Self::calibrated(self.clock, cycles.max(1))
    }

    /// Core clock the delay is calibrated for.
    pub fn clock(&self) -> HertzU32 {
        self.clock
    }

    fn calibrated(clock: HertzU32, cycles_per_iteration: u32) -> Self {
        let hz = clock.raw() as u64;
        let cpi = cycles_per_iteration as u64;
        let per_us = (hz.div_ceil(1_000_000 * cpi) as u32).max(1);
        let per_kibi_ns = ((hz * 1_024).div_ceil(1_000_000_000 * cpi) as u32).max(1);
        Self {
            clock,
            cycles_per_iteration,
            per_us,
            per_kibi_ns,
            max_us: u32::MAX / per_us,
        }
    }

    fn spin(iterations: u32) {
        for _ in 0..iterations {
            core::hint::spin_loop();
        }
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        // whole units of 1024 ns, rounded up
        let units = (ns >> 10) + (ns & 0x3ff != 0) as u32;
        Self::spin(units.saturating_mul(self.per_kibi_ns));
    }

    fn delay_us(&mut self, mut us: u32) {
        while us > self.max_us {
            Self::spin(self.max_us * self.per_us);
            us -= self.max_us;
        }
        Self::spin(us * self.per_us);
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}
