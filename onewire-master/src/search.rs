use heapless::Vec;

use crate::{
    OneWire, OneWireError, OneWireResult, Rom,
    consts::{MAX_CONFLICT_DEPTH, ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD},
};

#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Type of search performed by [`RomRegistry::search_with`](crate::RomRegistry::search_with).
pub enum SearchKind {
    /// Normal search
    #[default]
    Normal = ONEWIRE_SEARCH_CMD,
    /// Search only for devices with alarm
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

/// Devices' answer to one search bit position: the address bit, then its complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    /// Devices disagree at this position.
    Conflict,
    AllZero,
    AllOne,
    /// No device pulled the bus in either slot.
    NoResponse,
}

impl Response {
    fn from_bits(id_bit: bool, complement: bool) -> Self {
        match (id_bit, complement) {
            (false, false) => Self::Conflict,
            (false, true) => Self::AllZero,
            (true, false) => Self::AllOne,
            (true, true) => Self::NoResponse,
        }
    }
}

/// Backtracking state of the search across passes.
///
/// Bit `n` records whether the 1 branch of the `n`-th conflict met in a pass
/// has been explored. Conflicts use positions `1..=MAX_CONFLICT_DEPTH`;
/// position 0 is set once every branch has been explored.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DiffStack {
    bits: u32,
    ptr: u8,
}

impl DiffStack {
    pub(crate) const fn new() -> Self {
        Self { bits: 0, ptr: 0 }
    }

    /// Starts a new pass at the bottom of the stack.
    pub(crate) fn rewind(&mut self) {
        self.ptr = 0;
    }

    fn is_set(&self, pos: u8) -> bool {
        self.bits & (1 << pos) != 0
    }

    /// Moves to the next conflict and returns the branch to take there,
    /// or `None` if the stack is full.
    pub(crate) fn push(&mut self) -> Option<bool> {
        if self.ptr >= MAX_CONFLICT_DEPTH {
            return None;
        }
        self.ptr += 1;
        Some(self.is_set(self.ptr))
    }

    /// Selects the branches of the next pass, like incrementing a binary
    /// counter from the deepest conflict of this pass: explored 1 branches
    /// are cleared, and the first unexplored one is set.
    ///
    /// Returns `true` when no unexplored branch remains.
    pub(crate) fn advance(&mut self) -> bool {
        let mut pos = self.ptr;
        while pos > 0 && self.is_set(pos) {
            self.bits &= !(1 << pos);
            pos -= 1;
        }
        self.bits |= 1 << pos;
        pos == 0
    }
}

/// Enumerates the devices on a bus into a fixed-capacity list.
///
/// Each pass issues a reset and the search command, then walks all 64 ROM
/// bits: reads the bit and its complement, picks a branch and writes it back
/// so devices on the other branch drop out until the next reset. Conflicts
/// are resolved 0 branch first; the [`DiffStack`] remembers which 1 branches
/// are left for later passes.
pub(crate) struct RomSearch<'a, T> {
    onewire: &'a mut T,
    cmd: u8,
    stack: DiffStack,
}

impl<'a, T: OneWire> RomSearch<'a, T> {
    pub(crate) fn new(onewire: &'a mut T, kind: SearchKind) -> Self {
        Self {
            onewire,
            cmd: kind as _,
            stack: DiffStack::new(),
        }
    }

    /// Runs passes until the tree is exhausted or `roms` is full.
    ///
    /// # Returns
    /// The number of ROM codes stored in `roms`, `0` if the bus stopped
    /// responding, or `N` if more devices may be present.
    pub(crate) fn run<const N: usize>(
        mut self,
        roms: &mut Vec<Rom, N>,
    ) -> OneWireResult<usize, T::BusError> {
        roms.clear();
        let mut output = false;
        for slot in 0..N {
            self.stack.rewind();
            let mut rom = [0u8; 8];
            for (byte_idx, byte) in rom.iter_mut().enumerate() {
                for bit_idx in 0..8 {
                    if byte_idx == 0 && bit_idx == 0 {
                        // presence is not checked, an empty bus shows up as no response
                        self.onewire.reset()?;
                        self.onewire.write_byte(self.cmd)?;
                    } else {
                        self.onewire.write_bit(output)?;
                    }
                    let id_bit = self.onewire.read_bit()?;
                    let complement = self.onewire.read_bit()?;
                    output = match Response::from_bits(id_bit, complement) {
                        Response::Conflict => match self.stack.push() {
                            Some(branch) => branch,
                            None => {
                                roms.clear();
                                return Err(OneWireError::ConflictDepthExceeded);
                            }
                        },
                        Response::AllZero => false,
                        Response::AllOne => true,
                        Response::NoResponse => {
                            log::warn!(
                                "no response at bit {} of slot {slot}, aborting search",
                                byte_idx * 8 + bit_idx
                            );
                            roms.clear();
                            return Ok(0);
                        }
                    };
                    if output {
                        *byte |= 1 << bit_idx;
                    }
                }
            }
            let rom = Rom::new(rom);
            log::debug!("found ROM {rom} in slot {slot}");
            if roms.push(rom).is_err() {
                break;
            }
            if self.stack.advance() {
                log::trace!("search finished after {} passes", slot + 1);
                return Ok(roms.len());
            }
        }
        log::warn!("search stopped at capacity {N}, more devices may be present");
        Ok(roms.len())
    }
}
