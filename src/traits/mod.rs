//! Trait definitions for the hardware seams of the signal drivers.
//!
//! Drivers are generic over small capability traits so the same decision
//! logic runs against real peripherals, the mock HAL, or a desktop
//! simulation:
//!
//! - [`HardwareTimer`]: one-shot microsecond timer for the dual-timer driver
//! - [`PulseChannel`]: pulse-train peripheral (or software ring) for the
//!   buffered driver
//!
//! The output pin of the dual-timer driver is not abstracted here: it is
//! `embedded_hal::digital::OutputPin`, the ecosystem-standard trait.

pub mod hardware;

pub use hardware::*;
