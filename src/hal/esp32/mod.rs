//! ESP32 RMT-based DCC signal output.
//!
//! The RMT (remote control) peripheral transmits pulse trains from its own
//! buffer memory with sub-microsecond accuracy, which makes it a natural
//! DCC transmitter: each DCC bit becomes one symmetric high/low pulse pair,
//! and the peripheral's internal ring buffer plays the role of the pulse
//! channel. `esp-idf-hal`'s iterator-based transmit API does the refilling,
//! pulling pulses on demand from an infinite iterator over the register
//! list.
//!
//! # Hardware Setup
//!
//! The RMT output pin drives the DIRECTION input of an H-bridge motor
//! driver; the bridge converts the 3.3 V logic waveform into the bipolar
//! track signal.
//!
//! # Example
//!
//! ```ignore
//! use rs_dccgen::hal::esp32::Esp32RmtDriver;
//! use rs_dccgen::config::BitTiming;
//! use rs_dccgen::{RegisterList, station};
//!
//! let peripherals = Peripherals::take()?;
//! let regs: &'static RegisterList<{ station::MAIN_REGISTERS }> =
//!     Box::leak(Box::new(RegisterList::new()));
//!
//! let mut driver = Esp32RmtDriver::new(
//!     peripherals.rmt.channel0,
//!     peripherals.pins.gpio2,
//! )?;
//! driver.start(regs, BitTiming::default())?;
//! ```

use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::{PinState, Pulse, PulseTicks, RmtChannel, TxRmtDriver};
use esp_idf_hal::sys::EspError;

use crate::config::BitTiming;
use crate::sequencer::RegisterList;

/// RMT transmitter for one track output pin.
pub struct Esp32RmtDriver<'d> {
    tx: TxRmtDriver<'d>,
}

impl Esp32RmtDriver<'static> {
    /// RMT clock divider: 80 MHz APB clock / 80 = 1 µs ticks.
    const CLOCK_DIVIDER: u8 = 80;

    /// Creates a transmitter on the given RMT channel and pin.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`EspError`] if the peripheral rejects the
    /// configuration; fatal at startup, per platform init policy.
    pub fn new<C, CI, P, PI>(channel: C, pin: P) -> Result<Self, EspError>
    where
        CI: RmtChannel,
        C: Peripheral<P = CI> + 'static,
        PI: OutputPin,
        P: Peripheral<P = PI> + 'static,
    {
        let config = TransmitConfig::new().clock_divider(Self::CLOCK_DIVIDER);
        let tx = TxRmtDriver::new(channel, pin, &config)?;
        Ok(Self { tx })
    }

    /// Starts continuous transmission from a register list.
    ///
    /// The list must be `'static` because the peripheral keeps pulling
    /// pulses from it for the lifetime of the transmission.
    pub fn start<const N: usize>(
        &mut self,
        regs: &'static RegisterList<N>,
        timing: BitTiming,
    ) -> Result<(), EspError> {
        log::info!("starting RMT DCC output");
        self.tx.start_iter(BitPulseIter {
            regs,
            timing,
            low_half: None,
        })
    }

    /// Stops transmission.
    pub fn stop(&mut self) -> Result<(), EspError> {
        self.tx.stop()
    }
}

/// Infinite iterator turning the register list's bit stream into RMT
/// pulses: for each DCC bit, a high half-period followed by a low one.
struct BitPulseIter<const N: usize> {
    regs: &'static RegisterList<N>,
    timing: BitTiming,
    low_half: Option<Pulse>,
}

impl<const N: usize> Iterator for BitPulseIter<N> {
    type Item = Pulse;

    fn next(&mut self) -> Option<Pulse> {
        if let Some(low) = self.low_half.take() {
            return Some(low);
        }
        let half = self.timing.half_period_us(self.regs.next_bit());
        // Half-periods are well under the 15-bit tick limit; clamp rather
        // than panic inside the refill path if a config ever is not.
        let ticks = PulseTicks::new(half).unwrap_or_else(|_| PulseTicks::max());
        self.low_half = Some(Pulse::new(PinState::Low, ticks));
        Some(Pulse::new(PinState::High, ticks))
    }
}
