use heapless::Vec;

use crate::{
    OneWire, OneWireError, OneWireResult, Rom, SearchKind, consts::ONEWIRE_MATCH_ROM_CMD,
    search::RomSearch,
};

/// ROM codes discovered on a bus, up to `N` devices.
///
/// Storage is fixed; every search starts from an empty registry, so after a
/// search only the devices found by that search are listed, in discovery
/// order.
#[derive(Debug, Clone, Default)]
pub struct RomRegistry<const N: usize> {
    roms: Vec<Rom, N>,
}

impl<const N: usize> RomRegistry<N> {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self { roms: Vec::new() }
    }

    /// Maximum number of devices the registry can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of devices found by the last search.
    pub fn len(&self) -> usize {
        self.roms.len()
    }

    /// Whether the last search found no device.
    pub fn is_empty(&self) -> bool {
        self.roms.is_empty()
    }

    /// ROM code at `index`, in discovery order.
    pub fn get(&self, index: usize) -> Option<&Rom> {
        self.roms.get(index)
    }

    /// Discovered ROM codes, in discovery order.
    pub fn as_slice(&self) -> &[Rom] {
        &self.roms
    }

    /// Iterates over the discovered ROM codes.
    pub fn iter(&self) -> core::slice::Iter<'_, Rom> {
        self.roms.iter()
    }

    /// Discovers the devices on the bus, replacing the registry content.
    ///
    /// This method implements a binary-tree [1-Wire search](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html)
    /// with conflict backtracking. One pass of 64 bit positions is needed per
    /// device, so the call blocks for about `14 ms` per device found.
    ///
    /// # Returns
    /// * `0` if no device is present, or the devices stopped responding mid-search.
    /// * The number of devices found, at most `N`. When more than `N` devices
    ///   are present, exactly `N` of them are stored and `N` is returned.
    ///
    /// # Errors
    /// Line errors, after which the registry holds the devices found before
    /// the failure, and [`OneWireError::ConflictDepthExceeded`] if one pass
    /// meets more than [`MAX_CONFLICT_DEPTH`](crate::consts::MAX_CONFLICT_DEPTH)
    /// conflicts, after which it is empty.
    ///
    /// The conflict limit is checked before capacity: a bus whose devices fork
    /// more than `MAX_CONFLICT_DEPTH` times along one path fails with
    /// `ConflictDepthExceeded` even when it holds more than `N` devices and
    /// the search would otherwise have saturated.
    pub fn search<T: OneWire>(&mut self, bus: &mut T) -> OneWireResult<usize, T::BusError> {
        self.search_with(bus, SearchKind::Normal)
    }

    /// Discovers devices using the given kind of search.
    ///
    /// [`SearchKind::Alarmed`] only lists devices with an alarm condition.
    pub fn search_with<T: OneWire>(
        &mut self,
        bus: &mut T,
        kind: SearchKind,
    ) -> OneWireResult<usize, T::BusError> {
        RomSearch::new(bus, kind).run(&mut self.roms)
    }

    /// Addresses the device at `index` and sends it one byte.
    ///
    /// Writes the Match ROM command, the stored ROM code in wire order and
    /// `data`. The bus must have been reset right before this call; no reset
    /// is issued here, so the command can be framed together with whatever
    /// the caller sends next.
    ///
    /// # Errors
    /// [`OneWireError::RomIndexOutOfRange`] if the last search found fewer
    /// than `index + 1` devices. Nothing is written in that case.
    pub fn select_and_send<T: OneWire>(
        &self,
        bus: &mut T,
        index: usize,
        data: u8,
    ) -> OneWireResult<(), T::BusError> {
        let rom = self
            .roms
            .get(index)
            .ok_or(OneWireError::RomIndexOutOfRange)?;
        let mut frame = [0u8; 10];
        frame[0] = ONEWIRE_MATCH_ROM_CMD;
        frame[1..9].copy_from_slice(rom.as_bytes());
        frame[9] = data;
        bus.write_bytes(&frame)
    }
}

impl<'a, const N: usize> IntoIterator for &'a RomRegistry<N> {
    type Item = &'a Rom;
    type IntoIter = core::slice::Iter<'a, Rom>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Config, InterruptControl, InterruptMasking, OneWireMaster,
        consts::{ONEWIRE_CONVERT_T_CMD, ONEWIRE_READ_SCRATCHPAD_CMD},
        sim::{SimBus, VirtualDevice},
    };
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::collections::BTreeSet;

    fn random_roms(rng: &mut StdRng, count: usize) -> BTreeSet<u64> {
        let mut roms = BTreeSet::new();
        while roms.len() < count {
            roms.insert(rng.random::<u64>());
        }
        roms
    }

    fn populated<const D: usize>(roms: &BTreeSet<u64>) -> SimBus<D> {
        let bus = SimBus::<D>::new();
        for &rom in roms {
            bus.attach(VirtualDevice::new(rom)).unwrap();
        }
        bus
    }

    #[test]
    fn repeated_searches_find_every_device() {
        let mut rng = StdRng::seed_from_u64(0x0001_0e1e);
        for count in [1, 2, 5, 12] {
            let roms = random_roms(&mut rng, count);
            let bus = populated::<12>(&roms);
            let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
            let mut registry = RomRegistry::<16>::new();
            for _ in 0..3 {
                assert_eq!(registry.search(&mut master).unwrap(), count);
                let found: BTreeSet<u64> = registry.iter().map(|&rom| rom.into()).collect();
                assert_eq!(found, roms);
            }
        }
    }

    #[test]
    fn search_on_empty_bus_finds_nothing() {
        let bus = SimBus::<1>::new();
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<4>::new();
        assert_eq!(registry.search(&mut master).unwrap(), 0);
        assert!(registry.is_empty());
        // aborted on the first bit pair of the first pass
        assert_eq!(bus.resets(), 1);
        assert_eq!(bus.slots(), 8 + 2);
    }

    struct FailsAfterResets<T> {
        inner: T,
        resets: usize,
        dead_after: usize,
    }

    impl<T: OneWire> OneWire for FailsAfterResets<T> {
        type BusError = T::BusError;

        fn reset(&mut self) -> OneWireResult<bool, Self::BusError> {
            self.resets += 1;
            self.inner.reset()
        }

        fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
            self.inner.write_bit(bit)
        }

        fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
            if self.resets > self.dead_after {
                // released line, nobody pulls it low any more
                return Ok(true);
            }
            self.inner.read_bit()
        }
    }

    #[test]
    fn search_aborts_when_bus_dies_mid_enumeration() {
        let bus = SimBus::<3>::new()
            .with_device(VirtualDevice::new(0x01))
            .with_device(VirtualDevice::new(0x02))
            .with_device(VirtualDevice::new(0x03));
        let master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut flaky = FailsAfterResets {
            inner: master,
            resets: 0,
            dead_after: 2,
        };
        let mut registry = RomRegistry::<4>::new();
        assert_eq!(registry.search(&mut flaky.inner).unwrap(), 3);

        // two passes store devices, the third finds a silent bus
        assert_eq!(registry.search(&mut flaky).unwrap(), 0);
        assert_eq!(flaky.resets, 3);
        assert!(registry.is_empty());
        assert_eq!(registry.get(0), None);
    }

    #[test]
    fn conflict_limit_takes_precedence_over_capacity() {
        // 33 devices whose ROMs fork at every one of the first 32 bits
        let bus = SimBus::<33>::new();
        for n in 0..33u32 {
            let rom = (if n == 32 { 0 } else { 1u64 << n }) | (0xff << 56);
            bus.attach(VirtualDevice::new(rom)).unwrap();
        }
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<4>::new();
        assert_eq!(
            registry.search(&mut master),
            Err(OneWireError::ConflictDepthExceeded)
        );
        assert!(registry.is_empty());
        assert_eq!(bus.resets(), 1);
    }

    #[test]
    fn search_saturates_at_capacity() {
        let mut rng = StdRng::seed_from_u64(7);
        let roms = random_roms(&mut rng, 9);
        let bus = populated::<9>(&roms);
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<4>::new();
        assert_eq!(registry.search(&mut master).unwrap(), 4);
        assert_eq!(registry.len(), registry.capacity());
        let found: BTreeSet<u64> = registry.iter().map(|&rom| rom.into()).collect();
        assert_eq!(found.len(), 4);
        assert!(found.is_subset(&roms));
        assert_eq!(bus.resets(), 4);
    }

    #[test]
    fn exact_capacity_is_not_saturation() {
        let bus = SimBus::<3>::new()
            .with_device(VirtualDevice::new(0x01))
            .with_device(VirtualDevice::new(0x02))
            .with_device(VirtualDevice::new(0x03));
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<3>::new();
        assert_eq!(registry.search(&mut master).unwrap(), 3);
        assert_eq!(bus.resets(), 3);
    }

    #[test]
    fn new_search_replaces_previous_results() {
        let bus = SimBus::<3>::new()
            .with_device(VirtualDevice::new(0x10))
            .with_device(VirtualDevice::new(0x20).with_alarm())
            .with_device(VirtualDevice::new(0x30));
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<4>::new();
        assert_eq!(registry.search(&mut master).unwrap(), 3);
        assert_eq!(
            registry.search_with(&mut master, SearchKind::Alarmed).unwrap(),
            1
        );
        assert_eq!(registry.as_slice(), &[Rom::from(0x20)]);
        assert_eq!(registry.get(1), None);
    }

    #[test]
    fn select_and_send_addresses_one_device() {
        let bus = SimBus::<3>::new()
            .with_device(VirtualDevice::new(0x5500_0000_0000_0128))
            .with_device(VirtualDevice::new(0x5500_0000_0000_0228))
            .with_device(VirtualDevice::new(0x5500_0000_0000_0328));
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<4>::new();
        assert_eq!(registry.search(&mut master).unwrap(), 3);
        let target = *registry.get(1).unwrap();

        let resets = bus.resets();
        assert!(master.reset().unwrap());
        registry
            .select_and_send(&mut master, 1, ONEWIRE_CONVERT_T_CMD)
            .unwrap();
        // no reset of its own
        assert_eq!(bus.resets(), resets + 1);

        for index in 0..bus.device_count() {
            let device = bus.device(index).unwrap();
            if device.rom() == target {
                assert_eq!(device.received(), &[ONEWIRE_CONVERT_T_CMD]);
            } else {
                assert!(device.received().is_empty());
                assert!(!device.is_selected());
            }
        }
    }

    #[test]
    fn select_and_send_continues_the_addressed_transaction() {
        let bus = SimBus::<2>::new()
            .with_device(VirtualDevice::new(0x0a).with_echo())
            .with_device(VirtualDevice::new(0x0b));
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<2>::new();
        registry.search(&mut master).unwrap();
        let index = registry.iter().position(|rom| *rom == Rom::from(0x0a)).unwrap();
        master.reset().unwrap();
        registry
            .select_and_send(&mut master, index, ONEWIRE_READ_SCRATCHPAD_CMD)
            .unwrap();
        assert_eq!(master.read_byte().unwrap(), ONEWIRE_READ_SCRATCHPAD_CMD);
    }

    #[test]
    fn select_and_send_rejects_unknown_index() {
        let bus = SimBus::<1>::new().with_device(VirtualDevice::new(0x28));
        let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
        let mut registry = RomRegistry::<2>::new();
        registry.search(&mut master).unwrap();
        let slots = bus.slots();
        assert_eq!(
            registry.select_and_send(&mut master, 1, 0x44),
            Err(OneWireError::RomIndexOutOfRange)
        );
        assert_eq!(bus.slots(), slots);
    }

    #[test]
    fn select_and_send_is_one_masked_operation() {
        struct Count<'a>(&'a mut usize);

        impl InterruptControl for Count<'_> {
            fn enter(&mut self) {
                *self.0 += 1;
            }

            fn exit(&mut self) {}
        }

        let bus = SimBus::<1>::new().with_device(VirtualDevice::new(0x28));
        let registry = {
            let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new()).unwrap();
            let mut registry = RomRegistry::<1>::new();
            registry.search(&mut master).unwrap();
            master.reset().unwrap();
            registry
        };
        let mut enters = 0;
        let config = Config::new().with_masking(InterruptMasking::Operation);
        let mut master =
            OneWireMaster::with_interrupts(bus.line(), bus.delay(), Count(&mut enters), config)
                .unwrap();
        registry.select_and_send(&mut master, 0, 0x44).unwrap();
        drop(master);
        assert_eq!(enters, 1);
        assert_eq!(bus.device(0).unwrap().received(), &[0x44]);
    }
}
