//! Command and timing constants for standard-speed 1-Wire communication.

/// Command to search for devices on the 1-Wire bus
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;

/// Command to search for devices in alarm state on the 1-Wire bus
pub const ONEWIRE_CONDITIONAL_SEARCH_CMD: u8 = 0xec;

/// Command to match a specific ROM address in 1-Wire communication
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command to skip ROM addressing and talk to every device on the bus.
///
/// Not used by this crate; passed through by device drivers.
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// Function command starting a temperature conversion on thermometer devices.
pub const ONEWIRE_CONVERT_T_CMD: u8 = 0x44;

/// Function command reading the scratchpad of an addressed device.
pub const ONEWIRE_READ_SCRATCHPAD_CMD: u8 = 0xbe;

/// Length of the reset pulse, and of the whole presence window after it.
pub const RESET_DELAY_US: u32 = 500;

/// The longer part of a 65 us time slot. Also the wait between releasing
/// the bus after reset and sampling for a presence pulse.
pub const LONG_DELAY_US: u32 = 60;

/// The shorter part of a 65 us time slot.
pub const SHORT_DELAY_US: u32 = 5;

/// Delay between releasing the bus and sampling it in a read slot.
/// Devices hold a zero for at least 15 us from the falling edge.
pub const SAMPLE_DELAY_US: u32 = 5;

/// Duration of a single bit time slot.
pub const SLOT_US: u32 = SHORT_DELAY_US + LONG_DELAY_US;

/// Number of branch points the search can backtrack through in one pass.
///
/// 31 conflicts guarantee discovery of 32 devices.
pub const MAX_CONFLICT_DEPTH: u8 = 31;
