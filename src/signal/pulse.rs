//! Buffered pulse-peripheral driver.
//!
//! Hardware like a pulse-train peripheral transmits with cycle-accurate
//! timing on its own; the only real-time duty left to software is keeping
//! the peripheral's buffer from running dry. This driver does exactly that:
//! [`prime`](BufferedPulseDriver::prime) fills the channel before
//! transmission starts and [`service`](BufferedPulseDriver::service) tops
//! it up from the register list whenever enough slots have drained.
//!
//! `service` must run at least once while the channel drains from full down
//! to the refill threshold. At nominal DCC timing each queued bit buys
//! 116-200 µs, so even a small channel gives the caller milliseconds of
//! slack. An underrun freezes the pin at its last level and is a bug, not a
//! handled condition.
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::config::{BitTiming, PulseDriverConfig};
//! use rs_dccgen::signal::{BufferedPulseDriver, PulseRing};
//! use rs_dccgen::RegisterList;
//!
//! let regs: RegisterList<4> = RegisterList::new();
//! let ring: PulseRing<64> = PulseRing::new();
//! let mut driver = BufferedPulseDriver::new(
//!     &ring,
//!     &regs,
//!     BitTiming::default(),
//!     PulseDriverConfig::default(),
//! );
//!
//! driver.prime().unwrap();
//! assert_eq!(ring.len(), 64);
//! // ...playout drains the ring; the control loop calls service()...
//! let _ = ring.pop();
//! driver.service().unwrap();
//! ```

use crate::config::{BitTiming, PulseDriverConfig};
use crate::sequencer::RegisterList;
use crate::traits::{Pulse, PulseChannel};

/// Pulses staged per channel write. Keeps the stack buffer small without
/// paying per-pulse call overhead.
const CHUNK: usize = 32;

/// Driver that keeps a pulse channel supplied from a register list.
pub struct BufferedPulseDriver<'a, C: PulseChannel, const N: usize> {
    channel: C,
    regs: &'a RegisterList<N>,
    timing: BitTiming,
    config: PulseDriverConfig,
}

impl<'a, C: PulseChannel, const N: usize> BufferedPulseDriver<'a, C, N> {
    /// Creates a driver over a channel. Call [`prime`](Self::prime) before
    /// starting the channel.
    pub fn new(
        channel: C,
        regs: &'a RegisterList<N>,
        timing: BitTiming,
        config: PulseDriverConfig,
    ) -> Self {
        Self {
            channel,
            regs,
            timing,
            config,
        }
    }

    /// Fills the channel to capacity. Returns the number of pulses queued.
    pub fn prime(&mut self) -> Result<usize, C::Error> {
        let free = self.channel.free();
        self.fill(free)
    }

    /// Tops the channel up if at least the refill threshold has drained.
    ///
    /// Cheap when there is nothing to do, so it can sit in a tight control
    /// loop or a drain interrupt. Returns the number of pulses queued.
    pub fn service(&mut self) -> Result<usize, C::Error> {
        let free = self.channel.free();
        if free < self.config.refill_threshold {
            return Ok(0);
        }
        self.fill(free)
    }

    /// Starts the channel's transmitter.
    pub fn start(&mut self) -> Result<(), C::Error> {
        log::debug!("pulse driver starting");
        self.channel.start()
    }

    fn fill(&mut self, mut count: usize) -> Result<usize, C::Error> {
        let mut chunk = [Pulse::default(); CHUNK];
        let total = count;
        while count > 0 {
            let n = count.min(CHUNK);
            for slot in chunk.iter_mut().take(n) {
                let bit = self.regs.next_bit();
                *slot = Pulse::symmetric(self.timing.half_period_us(bit));
            }
            self.channel.write(&chunk[..n])?;
            count -= n;
        }
        Ok(total)
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Mutable access to the underlying channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Releases the channel.
    pub fn release(self) -> C {
        self.channel
    }
}
