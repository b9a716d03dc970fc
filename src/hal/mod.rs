//! Hardware Abstraction Layer implementations.
//!
//! Concrete implementations of the traits in [`crate::traits`] (plus the
//! pin trait from `embedded-hal`) for the supported platforms:
//!
//! - `mock`: test doubles for desktop development
//! - `esp32`: RMT-based pulse channel driver (requires the `esp32` feature)

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "esp32")]
pub mod esp32;

#[cfg(feature = "std")]
pub use mock::*;

#[cfg(feature = "esp32")]
pub use esp32::*;
