use embedded_hal::digital::{InputPin, OutputPin};

/// How the bus is pulled high while released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// An external pull-up resistor holds the released bus high.
    #[default]
    External,
    /// The pin's internal pull-up is enabled while the bus is released.
    ///
    /// Internal pull-ups are too weak to power parasitic devices or
    /// drive a long bus with several externally powered devices.
    Internal,
}

/// The single open-drain signal shared by the master and all devices.
pub trait BusLine {
    /// Error type of the underlying pin.
    type Error;

    /// Forces the line to logic 0, overriding any pull resistor.
    fn drive_low(&mut self) -> Result<(), Self::Error>;

    /// Returns the line to high impedance, enabling the internal pull-up
    /// if `pull` asks for it.
    fn release(&mut self, pull: Pull) -> Result<(), Self::Error>;

    /// Samples the current logic level of the line.
    fn sample(&mut self) -> Result<bool, Self::Error>;
}

/// [`BusLine`] over an `embedded-hal` pin configured as open-drain output.
///
/// `set_low` pulls the bus down and `set_high` lets it float, so the pull
/// resistor must be selected when the pin itself is configured; [`Pull`] is
/// not applied by this adapter.
pub struct OpenDrainPin<P> {
    pin: P,
}

impl<P> OpenDrainPin<P> {
    /// Wraps an open-drain pin.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Returns the wrapped pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P, E> BusLine for OpenDrainPin<P>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
{
    type Error = E;

    fn drive_low(&mut self) -> Result<(), E> {
        self.pin.set_low()
    }

    fn release(&mut self, _pull: Pull) -> Result<(), E> {
        self.pin.set_high()
    }

    fn sample(&mut self) -> Result<bool, E> {
        self.pin.is_high()
    }
}
