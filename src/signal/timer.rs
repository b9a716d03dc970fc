//! Dual-timer GPIO toggle driver.
//!
//! One generic driver replaces the per-timer interrupt routines a fixed
//! firmware would stamp out for each physical timer: the platform wires two
//! timer expiries to [`on_period_start`](DualTimerDriver::on_period_start)
//! and [`on_half_period`](DualTimerDriver::on_half_period), and everything
//! else is shared logic.
//!
//! Each bit period runs the same cycle: the full-period timer fires at the
//! start of a bit, the pin goes high, the next bit is pulled from the
//! register list, and both timers are re-armed for that bit's duration:
//! the full timer at `2 × half`, the half timer at `half`. When the half
//! timer fires the pin goes low, completing the symmetric square wave
//! (58 µs halves for a one, 100 µs for a zero at nominal timing).
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::hal::mock::{MockPin, MockTimer};
//! use rs_dccgen::config::BitTiming;
//! use rs_dccgen::signal::DualTimerDriver;
//! use rs_dccgen::RegisterList;
//!
//! let regs: RegisterList<4> = RegisterList::new();
//! let mut driver = DualTimerDriver::new(
//!     MockPin::new(),
//!     MockTimer::new(),
//!     MockTimer::new(),
//!     &regs,
//!     BitTiming::default(),
//! );
//! driver.start().unwrap();
//! // Platform interrupt handlers then call on_period_start /
//! // on_half_period on every expiry.
//! ```

use embedded_hal::digital::OutputPin;

use crate::config::BitTiming;
use crate::sequencer::RegisterList;
use crate::traits::HardwareTimer;

/// Where the driver is within the current bit period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Not started, or stopped; the pin is held low.
    Idle,
    /// Pin high, waiting for the half-period expiry.
    HighPhase,
    /// Pin low, waiting for the next full-period expiry.
    LowPhase,
}

/// Pin or timer failure while (re)programming the waveform.
///
/// These only occur if the platform rejects a pin write or timer arm:
/// fatal conditions surfaced to platform init code, not runtime errors the
/// driver recovers from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverError<PE, TE> {
    /// The output pin rejected a level change.
    Pin(PE),
    /// A timer rejected an arm/disarm request.
    Timer(TE),
}

/// Dual-timer toggle driver for one track output pin.
///
/// Generic over the pin and a pair of one-shot timers so the same driver
/// serves any platform with two chained compare channels; the register
/// list reference is the only connection to the rest of the station.
pub struct DualTimerDriver<'a, P, TF, TH, const N: usize> {
    pin: P,
    full_timer: TF,
    half_timer: TH,
    regs: &'a RegisterList<N>,
    timing: BitTiming,
    state: DriverState,
}

impl<'a, P, TF, TH, const N: usize> DualTimerDriver<'a, P, TF, TH, N>
where
    P: OutputPin,
    TF: HardwareTimer,
    TH: HardwareTimer<Error = TF::Error>,
{
    /// Creates a driver; the pin stays low until [`start`](Self::start).
    pub fn new(
        pin: P,
        full_timer: TF,
        half_timer: TH,
        regs: &'a RegisterList<N>,
        timing: BitTiming,
    ) -> Self {
        Self {
            pin,
            full_timer,
            half_timer,
            regs,
            timing,
            state: DriverState::Idle,
        }
    }

    /// Begins transmission by running the first bit period immediately.
    pub fn start(&mut self) -> Result<(), DriverError<P::Error, TF::Error>> {
        log::debug!("dual-timer driver starting");
        self.on_period_start().map(|_| ())
    }

    /// Full-period expiry handler: start of a bit.
    ///
    /// Sets the pin high, pulls the next bit, and re-arms both timers for
    /// that bit's duration. Returns the armed full period in microseconds
    /// (useful to platforms that program a deadline from the ISR).
    pub fn on_period_start(&mut self) -> Result<u32, DriverError<P::Error, TF::Error>> {
        self.pin.set_high().map_err(DriverError::Pin)?;
        let bit = self.regs.next_bit();
        let half = self.timing.half_period_us(bit) as u32;
        self.full_timer.arm(half * 2).map_err(DriverError::Timer)?;
        self.half_timer.arm(half).map_err(DriverError::Timer)?;
        self.state = DriverState::HighPhase;
        Ok(half * 2)
    }

    /// Half-period expiry handler: midpoint of a bit.
    pub fn on_half_period(&mut self) -> Result<(), DriverError<P::Error, TF::Error>> {
        self.pin.set_low().map_err(DriverError::Pin)?;
        self.state = DriverState::LowPhase;
        Ok(())
    }

    /// Stops transmission and parks the pin low.
    pub fn stop(&mut self) -> Result<(), DriverError<P::Error, TF::Error>> {
        self.full_timer.disarm().map_err(DriverError::Timer)?;
        self.half_timer.disarm().map_err(DriverError::Timer)?;
        self.pin.set_low().map_err(DriverError::Pin)?;
        self.state = DriverState::Idle;
        log::debug!("dual-timer driver stopped");
        Ok(())
    }

    /// Current phase of the waveform state machine.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Releases the pin and timers.
    pub fn release(self) -> (P, TF, TH) {
        (self.pin, self.full_timer, self.half_timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockPin, MockTimer};
    use crate::packet::Packet;

    fn driver_with_packet<'a>(
        regs: &'a RegisterList<4>,
        packet: Packet,
    ) -> DualTimerDriver<'a, MockPin, MockTimer, MockTimer, 4> {
        regs.load(1, packet).unwrap();
        DualTimerDriver::new(
            MockPin::new(),
            MockTimer::new(),
            MockTimer::new(),
            regs,
            BitTiming::default(),
        )
    }

    #[test]
    fn periods_match_bit_values() {
        let regs: RegisterList<4> = RegisterList::new();
        let p = Packet::encode(&[0x0F, 0xF0, 0xFF], 0).unwrap();
        let mut driver = driver_with_packet(&regs, p);

        // First packet out is the initial idle frame; drain it so the
        // loaded packet is adopted, then check its periods bit by bit.
        driver.start().unwrap();
        for _ in 1..Packet::idle().len() {
            driver.on_half_period().unwrap();
            driver.on_period_start().unwrap();
        }
        for i in 0..p.len() {
            driver.on_half_period().unwrap();
            let period = driver.on_period_start().unwrap();
            let expected = if p.bit(i) { 116 } else { 200 };
            assert_eq!(period, expected, "bit {i}");
        }
    }

    #[test]
    fn pin_toggles_high_then_low() {
        let regs: RegisterList<4> = RegisterList::new();
        let mut driver = DualTimerDriver::new(
            MockPin::new(),
            MockTimer::new(),
            MockTimer::new(),
            &regs,
            BitTiming::default(),
        );

        assert_eq!(driver.state(), DriverState::Idle);
        driver.start().unwrap();
        assert_eq!(driver.state(), DriverState::HighPhase);
        driver.on_half_period().unwrap();
        assert_eq!(driver.state(), DriverState::LowPhase);

        let (pin, full, half) = driver.release();
        assert_eq!(pin.transitions, vec![true, false]);
        // Idle packet starts with a preamble one: 116 µs full, 58 µs half.
        assert_eq!(full.armed, vec![116]);
        assert_eq!(half.armed, vec![58]);
    }

    #[test]
    fn stop_disarms_and_parks_low() {
        let regs: RegisterList<4> = RegisterList::new();
        let mut driver = DualTimerDriver::new(
            MockPin::new(),
            MockTimer::new(),
            MockTimer::new(),
            &regs,
            BitTiming::default(),
        );
        driver.start().unwrap();
        driver.stop().unwrap();
        assert_eq!(driver.state(), DriverState::Idle);

        let (pin, full, half) = driver.release();
        assert!(!pin.state);
        assert_eq!(full.disarmed, 1);
        assert_eq!(half.disarmed, 1);
    }
}
