/// One wire communication error type.
///
/// Protocol outcomes (no presence pulse, no response during a search, more
/// devices than registry capacity) are reported as values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying line driver.
    Pin(E),
    /// The requested ROM registry slot holds no discovered device.
    RomIndexOutOfRange,
    /// A single search pass met more conflicts than the difference stack can hold.
    ConflictDepthExceeded,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Pin(other)
    }
}

impl<E> OneWireError<E> {
    /// Short description of the error, usable without `core::fmt`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OneWireError::Pin(_) => "Pin error",
            OneWireError::RomIndexOutOfRange => "ROM index out of range",
            OneWireError::ConflictDepthExceeded => "Conflict depth exceeded",
        }
    }
}
