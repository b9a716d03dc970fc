//! Double-buffered packet slot for one transmission channel.
//!
//! Each register holds two packet slots and an atomic index saying which
//! slot the consumer reads. The command layer only ever writes the inactive
//! slot; the consumer flips the index at a packet boundary and copies the
//! packet out. The [`RegisterList`](crate::sequencer::RegisterList) gate on
//! the pending-swap mailbox guarantees the producer never writes while a
//! flip for this register is still outstanding, so live bits are never
//! overwritten mid-packet.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::packet::Packet;

pub(crate) struct Register {
    slots: [UnsafeCell<Packet>; 2],
    active: AtomicU8,
}

impl Register {
    pub(crate) fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(Packet::idle()),
                UnsafeCell::new(Packet::idle()),
            ],
            active: AtomicU8::new(0),
        }
    }

    /// Producer side: overwrite the slot the consumer is not reading.
    ///
    /// SAFETY contract (upheld by `RegisterList::load`): called from the
    /// single producer context, and only while no pending swap targets this
    /// register, so `active` cannot flip underneath the write.
    pub(crate) fn write_update(&self, packet: Packet) {
        let idx = 1 - self.active.load(Ordering::Acquire) as usize;
        unsafe { *self.slots[idx].get() = packet };
    }

    /// Consumer side: flip to the freshly written slot and copy it out.
    ///
    /// Runs only at a packet boundary, in response to a pending swap.
    pub(crate) fn adopt(&self) -> Packet {
        let idx = 1 - self.active.load(Ordering::Relaxed);
        self.active.store(idx, Ordering::Release);
        unsafe { *self.slots[idx as usize].get() }
    }

    /// Consumer side: copy the live packet for a plain rotation visit.
    pub(crate) fn active_copy(&self) -> Packet {
        let idx = self.active.load(Ordering::Relaxed) as usize;
        unsafe { *self.slots[idx].get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_idle_in_both_slots() {
        let reg = Register::new();
        assert_eq!(reg.active_copy(), Packet::idle());
        assert_eq!(reg.adopt(), Packet::idle());
    }

    #[test]
    fn adopt_switches_to_updated_slot() {
        let reg = Register::new();
        let p = Packet::encode(&[0x03, 0x42, 0x41], 0).unwrap();
        reg.write_update(p);
        // Not visible until the boundary flip.
        assert_eq!(reg.active_copy(), Packet::idle());
        assert_eq!(reg.adopt(), p);
        assert_eq!(reg.active_copy(), p);
    }

    #[test]
    fn rewriting_before_adoption_keeps_latest() {
        let reg = Register::new();
        let first = Packet::encode(&[0x03, 0x10, 0x13], 0).unwrap();
        let second = Packet::encode(&[0x03, 0x20, 0x23], 0).unwrap();
        reg.write_update(first);
        reg.write_update(second);
        assert_eq!(reg.adopt(), second);
    }
}
