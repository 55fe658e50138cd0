use core::fmt;

/// A 64-bit ROM code identifying one device on the bus.
///
/// Stored in wire order: byte 0 (the family code) is transmitted first.
/// The serial number and CRC bytes are kept verbatim and never interpreted.
///
/// | Byte | Description |
/// |------|-------------|
/// | 0 | Family code (e.g., 0x28 for DS18B20) |
/// | 1-6 | Serial number |
/// | 7 | CRC-8 of bytes 0-6 |
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rom([u8; 8]);

impl Rom {
    /// Creates a ROM code from its bytes in wire order.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// The family code, identifying the device type.
    pub const fn family_code(&self) -> u8 {
        self.0[0]
    }

    /// The bytes in wire order.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl From<u64> for Rom {
    fn from(value: u64) -> Self {
        Self(value.to_le_bytes())
    }
}

impl From<Rom> for u64 {
    fn from(rom: Rom) -> Self {
        u64::from_le_bytes(rom.0)
    }
}

impl From<[u8; 8]> for Rom {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rom({self})")
    }
}

impl fmt::Display for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", u64::from(*self))
    }
}
