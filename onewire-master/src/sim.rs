//! A simulated 1-Wire bus with virtual devices and a virtual clock.
//!
//! [`SimBus`] stands in for the hardware: [`SimBus::line`] is a [`BusLine`]
//! and [`SimBus::delay`] a [`DelayNs`] advancing the virtual clock instead of
//! blocking. Devices decode the master's low pulses by their width, answer
//! resets with a presence pulse, follow the ROM commands and pull the line
//! low during read slots like real slaves do.

use core::{cell::RefCell, convert::Infallible};

use embedded_hal::delay::DelayNs;
use heapless::{HistoryBuffer, Vec};

use crate::{
    BusLine, Pull, Rom,
    consts::{
        ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SEARCH_CMD,
        ONEWIRE_SKIP_ROM_CMD,
    },
};

/// Shortest low pulse devices take as a reset.
const RESET_MIN_US: u64 = 480;
/// Low pulses shorter than this are a written 1 (or a read slot).
const WRITE_ONE_MAX_US: u64 = 15;
/// How long a device holds the line low to send a 0.
const DEVICE_HOLD_US: u64 = 30;
/// Delay between the end of a reset pulse and the presence pulse.
const PRESENCE_WAIT_US: u64 = 15;
/// Width of the presence pulse.
const PRESENCE_US: u64 = 240;
/// Payload bytes a device remembers.
const RECEIVED_CAPACITY: usize = 16;
/// Pulses kept for timing inspection.
const PULSE_HISTORY: usize = 32;

/// One low pulse on the bus and the high time that followed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    /// Time the master held the line low.
    pub low_us: u64,
    /// Time the line was released before the next falling edge.
    pub high_us: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStep {
    Bit,
    Complement,
    Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Ignores the bus until the next reset.
    Idle,
    Command { byte: u8, bits: u8 },
    Search { bit: u8, step: SearchStep },
    Match { bit: u8 },
    /// Addressed; receives payload bytes, or repeats the last one in echo mode.
    Selected { byte: u8, bits: u8, echo: Option<(u8, u8)> },
}

/// A slave device on a [`SimBus`].
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    rom: Rom,
    alarm: bool,
    echo: bool,
    phase: Phase,
    received: Vec<u8, RECEIVED_CAPACITY>,
}

impl VirtualDevice {
    /// Creates a device with the given 64-bit ROM code.
    pub fn new(rom: u64) -> Self {
        Self {
            rom: Rom::from(rom),
            alarm: false,
            echo: false,
            phase: Phase::Idle,
            received: Vec::new(),
        }
    }

    /// Puts the device in alarm state, so it joins conditional searches.
    pub fn with_alarm(mut self) -> Self {
        self.alarm = true;
        self
    }

    /// Once addressed, the device sends back the last payload byte it received
    /// in every following slot until the next reset.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// ROM code of the device.
    pub fn rom(&self) -> Rom {
        self.rom
    }

    /// Payload bytes received while addressed, oldest first.
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Whether the device is addressed by the current transaction.
    pub fn is_selected(&self) -> bool {
        matches!(self.phase, Phase::Selected { .. })
    }

    fn rom_bit(&self, bit: u8) -> bool {
        (self.rom.as_bytes()[(bit / 8) as usize] >> (bit % 8)) & 1 == 1
    }

    /// Whether the device holds the line low in the slot starting now.
    fn pulls_low(&self) -> bool {
        match self.phase {
            Phase::Search {
                bit,
                step: SearchStep::Bit,
            } => !self.rom_bit(bit),
            Phase::Search {
                bit,
                step: SearchStep::Complement,
            } => self.rom_bit(bit),
            Phase::Selected {
                echo: Some((byte, bit)),
                ..
            } => (byte >> bit) & 1 == 0,
            _ => false,
        }
    }

    fn on_reset(&mut self) {
        self.phase = Phase::Command { byte: 0, bits: 0 };
    }

    fn on_slot(&mut self, value: bool) {
        self.phase = match self.phase {
            Phase::Idle => Phase::Idle,
            Phase::Command { byte, bits } => {
                let byte = byte | (value as u8) << bits;
                if bits < 7 {
                    Phase::Command {
                        byte,
                        bits: bits + 1,
                    }
                } else {
                    self.command(byte)
                }
            }
            Phase::Search { bit, step } => match step {
                SearchStep::Bit => Phase::Search {
                    bit,
                    step: SearchStep::Complement,
                },
                SearchStep::Complement => Phase::Search {
                    bit,
                    step: SearchStep::Direction,
                },
                SearchStep::Direction if value != self.rom_bit(bit) => Phase::Idle,
                SearchStep::Direction if bit == 63 => Self::selected(),
                SearchStep::Direction => Phase::Search {
                    bit: bit + 1,
                    step: SearchStep::Bit,
                },
            },
            Phase::Match { bit } => {
                if value != self.rom_bit(bit) {
                    Phase::Idle
                } else if bit == 63 {
                    Self::selected()
                } else {
                    Phase::Match { bit: bit + 1 }
                }
            }
            Phase::Selected {
                echo: Some((byte, bit)),
                ..
            } => Phase::Selected {
                byte: 0,
                bits: 0,
                echo: Some((byte, (bit + 1) % 8)),
            },
            Phase::Selected {
                byte,
                bits,
                echo: None,
            } => {
                let byte = byte | (value as u8) << bits;
                if bits < 7 {
                    Phase::Selected {
                        byte,
                        bits: bits + 1,
                        echo: None,
                    }
                } else {
                    // a full buffer keeps the oldest bytes
                    let _ = self.received.push(byte);
                    Phase::Selected {
                        byte: 0,
                        bits: 0,
                        echo: self.echo.then_some((byte, 0)),
                    }
                }
            }
        };
    }

    fn command(&self, cmd: u8) -> Phase {
        let search = Phase::Search {
            bit: 0,
            step: SearchStep::Bit,
        };
        match cmd {
            ONEWIRE_SEARCH_CMD => search,
            ONEWIRE_CONDITIONAL_SEARCH_CMD if self.alarm => search,
            ONEWIRE_MATCH_ROM_CMD => Phase::Match { bit: 0 },
            ONEWIRE_SKIP_ROM_CMD => Self::selected(),
            _ => Phase::Idle,
        }
    }

    const fn selected() -> Phase {
        Phase::Selected {
            byte: 0,
            bits: 0,
            echo: None,
        }
    }
}

struct State<const D: usize> {
    now: u64,
    driven_low: bool,
    fell_at: u64,
    rose_at: Option<u64>,
    last_low: u64,
    held_from: u64,
    held_until: u64,
    pull: Option<Pull>,
    resets: usize,
    slots: usize,
    pulses: HistoryBuffer<Pulse, PULSE_HISTORY>,
    devices: Vec<VirtualDevice, D>,
}

impl<const D: usize> State<D> {
    fn drive_low(&mut self) {
        if self.driven_low {
            return;
        }
        if let Some(rose_at) = self.rose_at {
            self.pulses.write(Pulse {
                low_us: self.last_low,
                high_us: self.now - rose_at,
            });
        }
        self.driven_low = true;
        self.fell_at = self.now;
        if self.devices.iter().any(VirtualDevice::pulls_low) {
            self.held_from = self.now;
            self.held_until = self.now + DEVICE_HOLD_US;
        }
    }

    fn release(&mut self, pull: Pull) {
        self.pull = Some(pull);
        if !self.driven_low {
            return;
        }
        self.driven_low = false;
        self.last_low = self.now - self.fell_at;
        self.rose_at = Some(self.now);
        if self.last_low >= RESET_MIN_US {
            self.resets += 1;
            self.devices.iter_mut().for_each(VirtualDevice::on_reset);
            if !self.devices.is_empty() {
                self.held_from = self.now + PRESENCE_WAIT_US;
                self.held_until = self.held_from + PRESENCE_US;
            }
        } else {
            self.slots += 1;
            let value = self.last_low < WRITE_ONE_MAX_US;
            for device in self.devices.iter_mut() {
                device.on_slot(value);
            }
        }
    }

    fn level(&self) -> bool {
        let held = self.now >= self.held_from && self.now < self.held_until;
        !(self.driven_low || held)
    }
}

/// A simulated bus holding up to `D` virtual devices.
pub struct SimBus<const D: usize> {
    state: RefCell<State<D>>,
}

impl<const D: usize> Default for SimBus<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> SimBus<D> {
    /// Creates an empty bus at virtual time zero.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                now: 0,
                driven_low: false,
                fell_at: 0,
                rose_at: None,
                last_low: 0,
                held_from: 0,
                held_until: 0,
                pull: None,
                resets: 0,
                slots: 0,
                pulses: HistoryBuffer::new(),
                devices: Vec::new(),
            }),
        }
    }

    /// Attaches a device. Devices beyond `D` are not attached.
    pub fn with_device(self, device: VirtualDevice) -> Self {
        if self.attach(device).is_err() {
            log::warn!("simulated bus full, device not attached");
        }
        self
    }

    /// Attaches a device, handing it back if the bus already holds `D` devices.
    pub fn attach(&self, device: VirtualDevice) -> Result<(), VirtualDevice> {
        self.state.borrow_mut().devices.push(device)
    }

    /// Line handle for a bus master.
    pub fn line(&self) -> SimLine<'_, D> {
        SimLine { bus: self }
    }

    /// Delay handle advancing the virtual clock.
    pub fn delay(&self) -> SimDelay<'_, D> {
        SimDelay { bus: self }
    }

    /// Virtual time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.state.borrow().now
    }

    /// Reset pulses seen on the bus.
    pub fn resets(&self) -> usize {
        self.state.borrow().resets
    }

    /// Time slots seen on the bus.
    pub fn slots(&self) -> usize {
        self.state.borrow().slots
    }

    /// Pull mode the master passed with its last release.
    pub fn last_pull(&self) -> Option<Pull> {
        self.state.borrow().pull
    }

    /// Recent completed pulses, oldest first.
    pub fn pulses(&self) -> Vec<Pulse, PULSE_HISTORY> {
        self.state.borrow().pulses.oldest_ordered().copied().collect()
    }

    /// Snapshot of the device attached at `index`.
    pub fn device(&self, index: usize) -> Option<VirtualDevice> {
        self.state.borrow().devices.get(index).cloned()
    }

    /// Number of attached devices.
    pub fn device_count(&self) -> usize {
        self.state.borrow().devices.len()
    }
}

/// [`BusLine`] handle of a [`SimBus`].
pub struct SimLine<'a, const D: usize> {
    bus: &'a SimBus<D>,
}

impl<const D: usize> BusLine for SimLine<'_, D> {
    type Error = Infallible;

    fn drive_low(&mut self) -> Result<(), Infallible> {
        self.bus.state.borrow_mut().drive_low();
        Ok(())
    }

    fn release(&mut self, pull: Pull) -> Result<(), Infallible> {
        self.bus.state.borrow_mut().release(pull);
        Ok(())
    }

    fn sample(&mut self) -> Result<bool, Infallible> {
        Ok(self.bus.state.borrow().level())
    }
}

/// [`DelayNs`] handle of a [`SimBus`]; delays advance the virtual clock.
pub struct SimDelay<'a, const D: usize> {
    bus: &'a SimBus<D>,
}

impl<const D: usize> SimDelay<'_, D> {
    fn advance(&mut self, us: u64) {
        self.bus.state.borrow_mut().now += us;
    }
}

impl<const D: usize> DelayNs for SimDelay<'_, D> {
    fn delay_ns(&mut self, ns: u32) {
        self.advance((ns as u64).div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(us as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64 * 1_000);
    }
}
