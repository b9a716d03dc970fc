//! Desktop simulation of the command station.
//!
//! Runs the real producer/consumer pair without hardware: one thread per
//! track plays the signal driver and pulls bits at full speed while the
//! main thread acts as the command layer: loading a throttle, running a
//! programming-track CV write, and waiting for it to go out.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example simulate
//! RUST_LOG=debug cargo run --example simulate
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rs_dccgen::config::BitTiming;
use rs_dccgen::ops::{self, Direction};
use rs_dccgen::{CommandStation, Track};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=================================");
    println!("  rs-dccgen station simulation");
    println!("=================================");
    println!();

    let station = CommandStation::new();
    let timing = BitTiming::default();
    let done = AtomicBool::new(false);

    thread::scope(|s| -> anyhow::Result<()> {
        // Main-track "driver": pulls bits and accounts simulated time.
        let main_waveform = s.spawn(|| {
            let regs = station.main_track();
            let mut bits: u64 = 0;
            let mut micros: u64 = 0;
            while !done.load(Ordering::Relaxed) {
                let bit = regs.next_bit();
                micros += timing.full_period_us(bit) as u64;
                bits += 1;
            }
            (bits, micros)
        });

        // Programming-track "driver": whole packets, gently paced so the
        // sequence drain is observable.
        let prog_packets = s.spawn(|| {
            let regs = station.prog_track();
            let mut packets: u64 = 0;
            while !done.load(Ordering::Relaxed) {
                regs.next_packet();
                packets += 1;
                thread::sleep(Duration::from_micros(200));
            }
            packets
        });

        // Command layer: throttle up loco 3 on the main track.
        let payload = ops::throttle(3, 50, Direction::Forward)?;
        station.load_register(Track::Main, 1, &payload, 0)?;
        println!("loaded: loco 3, speed 50, forward -> main register 1");

        // ...and write CV 29 on the programming track, waiting for the
        // exchange to fully leave the station.
        let seq = ops::service_mode_write_byte(29, 0x06)?;
        station.schedule_sequence(Track::Programming, &seq)?;
        println!("scheduled: CV 29 write exchange ({} entries)", seq.len());
        station.wait_for_sequence(Track::Programming, 0);
        println!("programming exchange complete");

        // Let the main track run a little longer, then stop.
        thread::sleep(Duration::from_millis(50));
        done.store(true, Ordering::Relaxed);

        let (bits, micros) = main_waveform.join().expect("main driver thread");
        let packets = prog_packets.join().expect("prog driver thread");

        println!();
        println!(
            "main track: {bits} bits = {:.1} ms of waveform",
            micros as f64 / 1000.0
        );
        println!("prog track: {packets} packets");
        Ok(())
    })
}
