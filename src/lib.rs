//! # rs-dccgen
//!
//! An NMRA DCC command-station core: packet registers, a priority
//! sequencer, and real-time signal drivers that put a physically correct
//! DCC bit-stream on the rails while the control path keeps updating what
//! is being sent.
//!
//! ## Features
//!
//! - **Packet registers**: double-buffered slots per locomotive, hot-swapped
//!   at packet boundaries so throttle updates never corrupt framing
//! - **Priority sequencer**: preemptive back-to-back packet runs for
//!   programming-track exchanges, plus one-shot repeats and round-robin
//!   refresh
//! - **Two driver families**: dual-timer GPIO toggling and buffered
//!   pulse-peripheral output, sharing one O(1) allocation-free pull path
//! - **Lock-free by design**: the command layer and the interrupt-context
//!   consumer share state through atomics only; no mutex ever sits on the
//!   real-time path
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `packet` - bit-level DCC frames
//! - `register` / `sequencer` - the register model and the pull/advance engine
//! - `ops` - payload builders (throttle, functions, accessories, CVs)
//! - `signal` - hardware-generic drivers
//! - `traits` - the timer/pulse-channel seams drivers are generic over
//! - `hal` - concrete implementations (mock for testing, esp32 for hardware)
//! - `station` - the two-track facade the command layer talks to
//!
//! ## Example
//!
//! ```rust
//! use rs_dccgen::config::{BitTiming, PulseDriverConfig};
//! use rs_dccgen::ops::{self, Direction};
//! use rs_dccgen::signal::{BufferedPulseDriver, PulseRing};
//! use rs_dccgen::{CommandStation, Track};
//!
//! let station = CommandStation::new();
//!
//! // Platform init: attach a driver to the main track.
//! let ring: PulseRing<64> = PulseRing::new();
//! let mut driver = BufferedPulseDriver::new(
//!     &ring,
//!     station.main_track(),
//!     BitTiming::default(),
//!     PulseDriverConfig::default(),
//! );
//! driver.prime().unwrap();
//!
//! // Command layer: loco 3 at speed 50, forward.
//! let payload = ops::throttle(3, 50, Direction::Forward).unwrap();
//! station.load_register(Track::Main, 1, &payload, 0).unwrap();
//!
//! // Real-time side: keep the channel full while hardware drains it.
//! driver.service().unwrap();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Timing and driver configuration.
pub mod config;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// DCC payload builders for the command integration layer.
pub mod ops;
/// Bit-level packet representation.
pub mod packet;
/// Double-buffered register slots (internal).
mod register;
/// Packet registers, rotation, and the real-time pull path.
pub mod sequencer;
/// Signal drivers turning bits into waveforms.
pub mod signal;
/// The two-track command station facade.
pub mod station;
/// Hardware seam traits for the signal drivers.
pub mod traits;

// Re-exports for convenience
pub use config::{BitTiming, PulseDriverConfig};
pub use packet::{Packet, MAX_PACKET_BITS, MAX_PAYLOAD_BYTES};
pub use sequencer::{RegisterList, MAX_SEQUENCE};
pub use signal::{BufferedPulseDriver, DualTimerDriver, PulseRing};
pub use station::{CommandStation, Track, MAIN_REGISTERS, PROG_REGISTERS};
pub use traits::{HardwareTimer, Pulse, PulseChannel};

/// Errors returned to the command layer.
///
/// All of these are caller-misuse rejections reported synchronously at the
/// call boundary; nothing here ever originates on the real-time path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Payload, bit image, or staged bytes exceed the packet buffer.
    TooLong,
    /// Empty payload or zero-length bit image.
    Empty,
    /// Register index outside the track's register list.
    BadRegister,
    /// A priority sequence is already active on this track.
    SequenceActive,
    /// More packets than the sequencer can hold.
    SequenceTooLong,
    /// Locomotive or accessory address out of range.
    InvalidAddress,
    /// Speed step above 126.
    InvalidSpeed,
    /// Configuration variable outside 1..=1024.
    InvalidCv,
    /// Bit index or sub-address out of range.
    InvalidValue,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::TooLong => "packet too long",
            Error::Empty => "empty packet",
            Error::BadRegister => "register index out of range",
            Error::SequenceActive => "a sequence is already active",
            Error::SequenceTooLong => "sequence too long",
            Error::InvalidAddress => "address out of range",
            Error::InvalidSpeed => "speed step out of range",
            Error::InvalidCv => "CV out of range",
            Error::InvalidValue => "value out of range",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
