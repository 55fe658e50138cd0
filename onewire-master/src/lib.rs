#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # onewire-master
//! A no-std, bit-banged 1-Wire bus master for microcontrollers without an operating system.
//!
//! [`OneWireMaster`] drives a single open-drain line (any [`BusLine`], e.g. an `embedded-hal`
//! pin wrapped in [`OpenDrainPin`]) with busy-wait delays from an
//! [`embedded_hal::delay::DelayNs`] implementation such as [`SpinDelay`]. It implements the
//! [`OneWire`] trait: reset with presence detection, and bit and byte transfers using the
//! standard-speed time slots. Interrupts can be suppressed around timing-critical windows
//! through an [`InterruptControl`] at the granularity chosen in [`Config`].
//!
//! [`RomRegistry`] discovers the ROM codes of all devices on a bus with the ROM search
//! algorithm and addresses single devices by their index.
//!
//! ```ignore
//! let mut master = OneWireMaster::new(OpenDrainPin::new(pin), SpinDelay::new(8.MHz()), Config::new())?;
//! let mut roms = RomRegistry::<8>::new();
//! let found = roms.search(&mut master)?;
//! for index in 0..found {
//!     master.reset()?;
//!     roms.select_and_send(&mut master, index, consts::ONEWIRE_CONVERT_T_CMD)?;
//! }
//! ```

mod config;
pub mod consts;
mod delay;
mod error;
mod interrupt;
mod line;
mod master;
mod registry;
mod rom;
mod search;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod traits;

pub use config::Config;
pub use delay::SpinDelay;
pub use error::OneWireError;
#[cfg(feature = "critical-section")]
pub use interrupt::CriticalSectionMasking;
pub use interrupt::{InterruptControl, InterruptMasking, NoMasking};
pub use line::{BusLine, OpenDrainPin, Pull};
pub use master::OneWireMaster;
pub use registry::RomRegistry;
pub use rom::Rom;
pub use search::SearchKind;
pub use traits::OneWire;

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
