//! ESP32 DCC command station firmware entry point.
//!
//! Brings up both track outputs on the RMT peripheral and runs a small
//! demonstration traffic loop. A real deployment replaces the loop with
//! the host command interface feeding the station.
//!
//! # Hardware Setup
//!
//! - GPIO2 -> DIRECTION input of H-bridge channel A (main track)
//! - GPIO3 -> DIRECTION input of H-bridge channel B (programming track)
//!
//! # Build
//!
//! ```bash
//! cargo build --features esp32 --target riscv32imc-esp-espidf
//! ```

use std::thread;
use std::time::Duration;

use esp_idf_hal::peripherals::Peripherals;
use rs_dccgen::config::BitTiming;
use rs_dccgen::hal::esp32::Esp32RmtDriver;
use rs_dccgen::ops::{self, Direction};
use rs_dccgen::{CommandStation, Track};

fn main() -> anyhow::Result<()> {
    esp_idf_hal::sys::link_patches();

    println!();
    println!("================================");
    println!("  rs-dccgen DCC Command Station");
    println!("================================");
    println!();

    let peripherals = Peripherals::take()?;

    // The RMT transmitters pull from the register lists for the lifetime
    // of the firmware, so the station is leaked into a 'static borrow.
    let station: &'static CommandStation = Box::leak(Box::new(CommandStation::new()));

    let mut main_out = Esp32RmtDriver::new(peripherals.rmt.channel0, peripherals.pins.gpio2)?;
    main_out.start(station.main_track(), BitTiming::default())?;
    println!("[OK] main track DCC output on GPIO2");

    let mut prog_out = Esp32RmtDriver::new(peripherals.rmt.channel1, peripherals.pins.gpio3)?;
    prog_out.start(station.prog_track(), BitTiming::default())?;
    println!("[OK] programming track DCC output on GPIO3");

    // Demonstration traffic: cycle loco 3 through a few speed steps.
    loop {
        for speed in [30u8, 60, 90, 60] {
            let payload = ops::throttle(3, speed, Direction::Forward)?;
            station.load_register(Track::Main, 1, &payload, 0)?;
            println!("loco 3 -> speed {speed}");
            thread::sleep(Duration::from_secs(2));
        }
    }
}
