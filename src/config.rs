//! Timing and driver configuration.
//!
//! Pin, timer and channel assignments are platform decisions made at driver
//! construction time; what lives here is the part the core owns: the NMRA
//! bit timing and the tunables of the buffered pulse driver.
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::config::{BitTiming, PulseDriverConfig};
//!
//! // NMRA nominal timing (the default).
//! let timing = BitTiming::default();
//! assert_eq!(timing.half_period_us(true), 58);
//! assert_eq!(timing.half_period_us(false), 100);
//!
//! // Refill the pulse channel once 32 slots have drained.
//! let config = PulseDriverConfig::default().with_refill_threshold(32);
//! ```

/// Half-period durations of the two DCC bit symbols.
///
/// Per NMRA S-9.1 a one-bit is the *shorter* symbol: nominally 58 µs per
/// half-period against 100 µs for a zero-bit. Both are adjustable within
/// the standard's tolerances for decoders that prefer stretched zeroes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitTiming {
    /// One-bit half-period in microseconds.
    pub one_half_us: u16,
    /// Zero-bit half-period in microseconds.
    pub zero_half_us: u16,
}

impl BitTiming {
    /// NMRA S-9.1 nominal timing.
    pub const NMRA: Self = Self {
        one_half_us: 58,
        zero_half_us: 100,
    };

    /// Half-period for the given bit value, in microseconds.
    #[inline]
    pub const fn half_period_us(&self, bit: bool) -> u16 {
        if bit {
            self.one_half_us
        } else {
            self.zero_half_us
        }
    }

    /// Full bit period (both half-periods), in microseconds.
    #[inline]
    pub const fn full_period_us(&self, bit: bool) -> u32 {
        self.half_period_us(bit) as u32 * 2
    }

    /// Override the one-bit half-period.
    pub fn with_one_half_us(mut self, micros: u16) -> Self {
        self.one_half_us = micros;
        self
    }

    /// Override the zero-bit half-period.
    pub fn with_zero_half_us(mut self, micros: u16) -> Self {
        self.zero_half_us = micros;
        self
    }
}

impl Default for BitTiming {
    fn default() -> Self {
        Self::NMRA
    }
}

/// Tunables for the buffered pulse driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PulseDriverConfig {
    /// Minimum free channel slots before a `service` call refills.
    ///
    /// Lower values mean more frequent, smaller refills; the ceiling is the
    /// channel capacity. The value trades refill-call overhead against how
    /// long the channel can coast between service calls.
    pub refill_threshold: usize,
}

impl PulseDriverConfig {
    /// Override the refill threshold.
    pub fn with_refill_threshold(mut self, threshold: usize) -> Self {
        self.refill_threshold = threshold;
        self
    }
}

impl Default for PulseDriverConfig {
    fn default() -> Self {
        Self {
            refill_threshold: 16,
        }
    }
}
