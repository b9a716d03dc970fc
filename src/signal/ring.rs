//! Lock-free SPSC ring of pulse descriptors.
//!
//! The software stand-in for a hardware pulse peripheral's buffer memory:
//! the buffered driver pushes pulse descriptors in, a playout loop (or a
//! test harness) pops them out. Single producer, single consumer, atomic
//! indices, no blocking on either side.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::traits::{Pulse, PulseChannel};

/// Returned when a write would overflow the ring.
///
/// Unlike a telemetry buffer, a transmit ring must never overwrite queued
/// pulses (that would corrupt the waveform), so a full ring rejects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingFull;

/// Fixed-capacity pulse ring.
///
/// `N` must be a power of two for mask-based index wrapping.
pub struct PulseRing<const N: usize> {
    slots: UnsafeCell<[Pulse; N]>,
    write_idx: AtomicUsize,
    read_idx: AtomicUsize,
}

// SAFETY: single producer (push), single consumer (pop); each slot is
// written before the Release store of write_idx that publishes it and
// never touched again until the consumer frees it.
unsafe impl<const N: usize> Sync for PulseRing<N> {}
unsafe impl<const N: usize> Send for PulseRing<N> {}

impl<const N: usize> PulseRing<N> {
    const MASK: usize = N - 1;

    /// Creates an empty ring.
    pub const fn new() -> Self {
        const { assert!(N.is_power_of_two(), "ring size must be a power of 2") };
        Self {
            slots: UnsafeCell::new([Pulse::symmetric(0); N]),
            write_idx: AtomicUsize::new(0),
            read_idx: AtomicUsize::new(0),
        }
    }

    /// Queues one pulse. Returns `false` if the ring is full.
    #[inline]
    pub fn push(&self, pulse: Pulse) -> bool {
        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);
        if write.wrapping_sub(read) >= N {
            return false;
        }
        // SAFETY: single producer; this slot is outside the readable span
        // until the Release store below.
        unsafe {
            (*self.slots.get())[write & Self::MASK] = pulse;
        }
        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Takes the oldest queued pulse, or `None` when empty.
    #[inline]
    pub fn pop(&self) -> Option<Pulse> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        if write == read {
            return None;
        }
        // SAFETY: single consumer; the slot was published by the producer's
        // Release store of write_idx.
        let pulse = unsafe { (*self.slots.get())[read & Self::MASK] };
        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(pulse)
    }

    /// Number of queued pulses.
    #[inline]
    pub fn len(&self) -> usize {
        let write = self.write_idx.load(Ordering::Acquire);
        let read = self.read_idx.load(Ordering::Acquire);
        write.wrapping_sub(read).min(N)
    }

    /// True when nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots available for pushing.
    #[inline]
    pub fn free(&self) -> usize {
        N - self.len()
    }

    /// Total slot count.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for PulseRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

// The ring doubles as a software pulse channel: the buffered driver writes
// through a shared reference while a playout loop pops from the other side.
impl<const N: usize> PulseChannel for &PulseRing<N> {
    type Error = RingFull;

    fn capacity(&self) -> usize {
        PulseRing::capacity(self)
    }

    fn free(&self) -> usize {
        PulseRing::free(self)
    }

    fn write(&mut self, pulses: &[Pulse]) -> Result<(), Self::Error> {
        for pulse in pulses {
            if !self.push(*pulse) {
                return Err(RingFull);
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        // A software ring has no transmitter to kick; draining is the
        // playout loop's job.
        Ok(())
    }
}
