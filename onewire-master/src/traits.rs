use crate::OneWireResult;

/// Trait for 1-Wire communication.
/// This trait defines the basic operations required for 1-Wire communication, such as resetting the bus,
/// writing and reading bytes, and writing and reading bits.
///
/// Byte operations have default implementations in terms of the bit operations, transferring the
/// least significant bit first.
pub trait OneWire {
    /// The error type returned by the operations of this trait.
    /// This type is used to indicate errors in the underlying hardware or communication.
    type BusError;

    /// Resets the 1-Wire bus and checks for a presence pulse.
    ///
    /// # Returns
    /// `true` if at least one device answered the reset with a presence pulse.
    ///
    /// # Errors
    /// This method returns an error if the underlying line fails.
    fn reset(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit to the 1-Wire bus.
    /// # Arguments
    ///
    /// * `bit` - The bit to write.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Reads a single bit from the 1-Wire bus.
    /// # Returns
    /// The bit read from the bus.
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a byte to the 1-Wire bus, least significant bit first.
    /// # Arguments
    /// * `byte` - The byte to write to the bus.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// Reads a byte from the 1-Wire bus. Bit `i` of the result is the `i`-th bit received.
    /// # Returns
    /// Byte read from the bus.
    ///
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Writes a sequence of bytes to the bus as one operation.
    fn write_bytes(&mut self, bytes: &[u8]) -> OneWireResult<(), Self::BusError> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Fills `buf` with bytes read from the bus.
    fn read_bytes(&mut self, buf: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        for byte in buf.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }
}
