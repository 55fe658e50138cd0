use clap::Parser;
use onewire_master::{
    Config, OneWire, OneWireMaster, Pull, RomRegistry, SearchKind,
    sim::{SimBus, VirtualDevice},
};
use rand::Rng;

/// Devices the simulated bus can hold.
const MAX_DEVICES: usize = 64;
/// ROM registry capacity.
const CAPACITY: usize = 32;

/// Discover and address virtual devices on a simulated 1-Wire bus
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// ROM code of a device to attach, in hex (e.g., 5a00000412345628)
    #[arg(short = 'd', long = "device", value_parser = parse_rom)]
    devices: Vec<u64>,
    /// Number of devices with random ROM codes to attach
    #[arg(short, long, default_value_t = 0)]
    random: usize,
    /// ROM code of a device to attach in alarm state, in hex
    #[arg(short, long = "alarmed", value_parser = parse_rom)]
    alarmed: Vec<u64>,
    /// Function command byte sent to each discovered device, in hex
    #[arg(short, long, default_value = "44", value_parser = parse_byte)]
    command: u8,
    /// Release the bus with the internal pull-up enabled
    #[arg(long)]
    internal_pullup: bool,
    /// Number of searches to run
    #[arg(short, long, default_value_t = 1)]
    passes: usize,
}

fn parse_rom(s: &str) -> Result<u64, String> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| format!("{s}: {e}"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| format!("{s}: {e}"))
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    // Populate the bus
    let bus = SimBus::<MAX_DEVICES>::new();
    let mut rng = rand::rng();
    let devices = args
        .devices
        .iter()
        .map(|&rom| VirtualDevice::new(rom))
        .chain(args.alarmed.iter().map(|&rom| VirtualDevice::new(rom).with_alarm()))
        .chain((0..args.random).map(|_| VirtualDevice::new(rng.random())));
    for device in devices {
        if bus.attach(device).is_err() {
            log::warn!("Bus full, attaching at most {MAX_DEVICES} devices");
            break;
        }
    }
    log::info!("Attached {} devices", bus.device_count());
    // Create the bus master
    let pull = if args.internal_pullup {
        Pull::Internal
    } else {
        Pull::External
    };
    let mut master = OneWireMaster::new(bus.line(), bus.delay(), Config::new().with_pull(pull))
        .expect("Failed to create bus master");
    log::debug!("Master configured with {:?}", master.config());
    let mut registry = RomRegistry::<CAPACITY>::new();
    // Enumerate devices on the 1-Wire bus
    for pass in 0..args.passes {
        let start = bus.now_us();
        let found = match registry.search(&mut master) {
            Ok(found) => found,
            Err(e) => {
                log::error!("Search {pass} failed: {}", e.as_str());
                break;
            }
        };
        log::info!(
            "Search {pass}: found {found} devices in {} us",
            bus.now_us() - start
        );
        for rom in &registry {
            log::info!("ROM: {rom}, family: {:02x}", rom.family_code());
        }
    }
    if !args.alarmed.is_empty() {
        let mut alarms = RomRegistry::<CAPACITY>::new();
        let found = alarms
            .search_with(&mut master, SearchKind::Alarmed)
            .expect("Failed to search for alarms");
        log::info!("{found} devices in alarm state");
        for rom in &alarms {
            log::info!("Alarm: {rom}");
        }
    }
    // Address every device found
    for index in 0..registry.len() {
        if !master.reset().expect("Failed to reset bus") {
            log::warn!("No presence pulse");
            continue;
        }
        registry
            .select_and_send(&mut master, index, args.command)
            .expect("Failed to address device");
    }
    for device in (0..bus.device_count()).filter_map(|index| bus.device(index)) {
        log::info!("Device {} received {:02x?}", device.rom(), device.received());
    }
}
