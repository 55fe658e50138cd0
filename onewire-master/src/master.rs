use embedded_hal::delay::DelayNs;

use crate::{
    BusLine, Config, InterruptControl, InterruptMasking, NoMasking, OneWire, OneWireResult,
    consts::{LONG_DELAY_US, RESET_DELAY_US, SAMPLE_DELAY_US, SHORT_DELAY_US},
};

/// A bit-banged 1-Wire bus master.
///
/// Takes ownership of the bus line (implementing [`BusLine`]), a delay
/// implementing [`DelayNs`] with microsecond precision, and an
/// [`InterruptControl`] used according to the configured
/// [`InterruptMasking`]. Every operation blocks for its full protocol
/// duration: 1 ms for a reset, 65 us per bit.
pub struct OneWireMaster<L, D, C = NoMasking> {
    line: L,
    delay: D,
    interrupts: C,
    config: Config,
}

impl<L: BusLine, D: DelayNs> OneWireMaster<L, D, NoMasking> {
    /// Creates a bus master that never touches interrupts, and releases the bus.
    pub fn new(line: L, delay: D, config: Config) -> OneWireResult<Self, L::Error> {
        Self::with_interrupts(line, delay, NoMasking, config)
    }
}

impl<L: BusLine, D: DelayNs, C: InterruptControl> OneWireMaster<L, D, C> {
    /// Creates a bus master suppressing interrupts through `interrupts`, and releases the bus.
    pub fn with_interrupts(
        line: L,
        delay: D,
        interrupts: C,
        config: Config,
    ) -> OneWireResult<Self, L::Error> {
        let mut master = Self {
            line,
            delay,
            interrupts,
            config,
        };
        master.line.release(config.pull)?;
        Ok(master)
    }

    /// Configuration the master was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives back the line, the delay and the interrupt controller.
    pub fn free(self) -> (L, D, C) {
        (self.line, self.delay, self.interrupts)
    }

    /// Runs `f` with interrupts suppressed if the configured masking is `level`.
    fn masked<R>(&mut self, level: InterruptMasking, f: impl FnOnce(&mut Self) -> R) -> R {
        let mask = self.config.masking == level;
        if mask {
            self.interrupts.enter();
        }
        let res = f(self);
        if mask {
            self.interrupts.exit();
        }
        res
    }

    fn write_slot(&mut self, bit: bool) -> Result<(), L::Error> {
        let (low, high) = if bit {
            (SHORT_DELAY_US, LONG_DELAY_US)
        } else {
            (LONG_DELAY_US, SHORT_DELAY_US)
        };
        self.masked(InterruptMasking::Slot, |m| -> Result<(), L::Error> {
            m.line.drive_low()?;
            m.delay.delay_us(low);
            m.line.release(m.config.pull)?;
            m.delay.delay_us(high);
            Ok(())
        })
    }

    fn read_slot(&mut self) -> Result<bool, L::Error> {
        self.masked(InterruptMasking::Slot, |m| -> Result<bool, L::Error> {
            // a short low pulse opens the slot
            m.line.drive_low()?;
            m.delay.delay_us(SHORT_DELAY_US);
            m.line.release(m.config.pull)?;
            m.delay.delay_us(SAMPLE_DELAY_US);
            let bit = m.line.sample()?;
            m.delay.delay_us(LONG_DELAY_US - SAMPLE_DELAY_US);
            Ok(bit)
        })
    }
}

impl<L: BusLine, D: DelayNs, C: InterruptControl> OneWire for OneWireMaster<L, D, C> {
    type BusError = L::Error;

    fn reset(&mut self) -> OneWireResult<bool, L::Error> {
        let present = self.masked(InterruptMasking::Operation, |m| -> Result<bool, L::Error> {
            m.line.drive_low()?;
            m.delay.delay_us(RESET_DELAY_US);
            let level = m.masked(InterruptMasking::Slot, |m| -> Result<bool, L::Error> {
                m.line.release(m.config.pull)?;
                m.delay.delay_us(LONG_DELAY_US);
                m.line.sample()
            })?;
            m.delay.delay_us(RESET_DELAY_US - LONG_DELAY_US);
            // a device answering the reset holds the bus low
            Ok(!level)
        })?;
        log::trace!("1-Wire reset, presence: {present}");
        Ok(present)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), L::Error> {
        Ok(self.masked(InterruptMasking::Operation, |m| m.write_slot(bit))?)
    }

    fn read_bit(&mut self) -> OneWireResult<bool, L::Error> {
        Ok(self.masked(InterruptMasking::Operation, |m| m.read_slot())?)
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), L::Error> {
        Ok(self.masked(InterruptMasking::Operation, |m| -> Result<(), L::Error> {
            for i in 0..8 {
                m.write_slot((byte >> i) & 1 == 1)?;
            }
            Ok(())
        })?)
    }

    fn read_byte(&mut self) -> OneWireResult<u8, L::Error> {
        Ok(self.masked(InterruptMasking::Operation, |m| -> Result<u8, L::Error> {
            let mut byte = 0;
            for i in 0..8 {
                if m.read_slot()? {
                    byte |= 1 << i;
                }
            }
            Ok(byte)
        })?)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> OneWireResult<(), L::Error> {
        Ok(self.masked(InterruptMasking::Operation, |m| -> Result<(), L::Error> {
            for &byte in bytes {
                for i in 0..8 {
                    m.write_slot((byte >> i) & 1 == 1)?;
                }
            }
            Ok(())
        })?)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> OneWireResult<(), L::Error> {
        Ok(self.masked(InterruptMasking::Operation, |m| -> Result<(), L::Error> {
            for byte in buf.iter_mut() {
                *byte = 0;
                for i in 0..8 {
                    if m.read_slot()? {
                        *byte |= 1 << i;
                    }
                }
            }
            Ok(())
        })?)
    }
}
