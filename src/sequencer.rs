//! Packet registers, rotation, and the real-time pull path.
//!
//! [`RegisterList`] is the heart of the command station: a fixed array of
//! double-buffered packet registers, a round-robin cursor, a hot-swap
//! mailbox, and an optional preemptive packet sequence. The command layer
//! mutates it from the main loop; a signal driver pulls bits from it inside
//! an interrupt or a high-priority refill task. The two sides never take a
//! lock: every shared field is either atomic or covered by the
//! "swap at a boundary, never mutate live data" discipline.
//!
//! # Register roles
//!
//! - **Register 0** is the one-shot register: accessory commands, CV writes
//!   and other packets that are sent a bounded number of times. Rotation
//!   never enters it on its own; it transmits only when freshly loaded, and
//!   then exactly its repeat budget.
//! - **Registers 1..** are throttle registers, each refreshed continuously
//!   in index order so every decoder keeps hearing its speed setting.
//!
//! # Advance decision
//!
//! When the current packet's bits run out the consumer decides what to send
//! next, in strict priority order:
//!
//! 1. an active [sequence](Self::schedule_sequence) entry (including its
//!    repeats),
//! 2. the one-shot register's remaining repeat budget,
//! 3. a freshly loaded register waiting in the hot-swap mailbox,
//! 4. plain rotation over registers `1..=max_loaded`.
//!
//! The decision is O(1) and allocation-free; it runs between two signal
//! half-periods and must never miss that deadline.
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::{Packet, RegisterList};
//!
//! let regs: RegisterList<4> = RegisterList::new();
//! let p = Packet::encode(&[0x03, 0x3F, 0xB2, 0x8E], 0).unwrap();
//! regs.load(1, p).unwrap();
//!
//! // The driver side pulls whole packets, bytes, or single bits.
//! let first = regs.next_packet();
//! assert_eq!(first, p);
//! ```

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace};

use crate::packet::Packet;
use crate::register::Register;
use crate::Error;

/// Capacity of the priority sequence.
pub const MAX_SEQUENCE: usize = 8;

/// Hot-swap mailbox sentinel: no load waiting for adoption.
const NO_PENDING: usize = usize::MAX;

/// Consumer-owned transmission state. Lives behind an `UnsafeCell` and is
/// touched exclusively by the single consumer context.
struct Cursor {
    /// Register currently transmitting.
    reg: usize,
    /// Bit position inside `packet`.
    bit: usize,
    /// Private copy of the packet being transmitted. Copying at the
    /// boundary means mid-packet reads never touch shared slots.
    packet: Packet,
    /// Transmissions still owed by the one-shot register.
    reg0_repeats_left: u8,
    seq_active: bool,
    seq_gen: usize,
    seq_pos: usize,
    seq_repeats_left: u8,
}

/// A track's packet registers plus the pull API consumed by signal drivers.
///
/// `N` is the total register count *including* the one-shot register 0, so
/// the smallest useful list is `RegisterList<2>`. The station uses one list
/// for the main track and an independent one for the programming track.
///
/// # Concurrency contract
///
/// Exactly one producer context may call the loading/scheduling methods and
/// exactly one consumer context may call the pull methods. The type is
/// `Sync` under that single-producer/single-consumer contract, which is
/// enforced by design rather than by the type system, the same way the
/// firmware's other ISR-shared structures work.
pub struct RegisterList<const N: usize> {
    regs: [Register; N],
    /// Rotation high-water mark (producer-written, consumer-read).
    max_loaded: AtomicUsize,
    /// Pending hot-swap target, or `NO_PENDING`. The producer publishes a
    /// load here with `Release` and the consumer clears it with `Release`
    /// *after* flipping the register's slots, so a producer that observes
    /// the mailbox empty also observes the flip.
    next_reg: AtomicUsize,
    /// Sequence storage: producer-owned while `seq_remaining == 0`,
    /// consumer-read while it is non-zero.
    seq: UnsafeCell<[Packet; MAX_SEQUENCE]>,
    seq_len: AtomicUsize,
    seq_gen: AtomicUsize,
    /// Entries not yet fully transmitted; non-zero means a sequence is
    /// active and preempting rotation.
    seq_remaining: AtomicUsize,
    cursor: UnsafeCell<Cursor>,
}

// SAFETY: single producer, single consumer, coordination through atomics.
// Packet slots follow the swap-never-mutate-live discipline documented on
// `Register`; the cursor is consumer-private; the sequence array is only
// written while inactive and its publication is ordered by `seq_remaining`.
unsafe impl<const N: usize> Sync for RegisterList<N> {}
unsafe impl<const N: usize> Send for RegisterList<N> {}

impl<const N: usize> RegisterList<N> {
    /// Creates a register list with every slot holding the idle packet, so
    /// a driver attached before any load still emits a valid DCC stream.
    pub fn new() -> Self {
        assert!(
            N >= 2,
            "register list needs the one-shot register plus a rotation slot"
        );
        Self {
            regs: core::array::from_fn(|_| Register::new()),
            max_loaded: AtomicUsize::new(1),
            next_reg: AtomicUsize::new(NO_PENDING),
            seq: UnsafeCell::new([Packet::idle(); MAX_SEQUENCE]),
            seq_len: AtomicUsize::new(0),
            seq_gen: AtomicUsize::new(0),
            seq_remaining: AtomicUsize::new(0),
            cursor: UnsafeCell::new(Cursor {
                reg: 0,
                bit: 0,
                packet: Packet::idle(),
                reg0_repeats_left: 0,
                seq_active: false,
                seq_gen: 0,
                seq_pos: 0,
                seq_repeats_left: 0,
            }),
        }
    }

    /// Total register count, including register 0.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Highest register index currently part of rotation.
    pub fn max_loaded(&self) -> usize {
        self.max_loaded.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Producer side
    // ------------------------------------------------------------------

    /// Loads a packet into a register.
    ///
    /// The packet goes into the register's inactive slot and becomes the
    /// transmitted packet at the next packet boundary (never mid-packet),
    /// after which the rotation cursor continues from that register. The
    /// packet previously loaded keeps transmitting unmodified until then.
    ///
    /// Waits for the consumer to adopt any outstanding load first; with a
    /// driver running this is bounded by one packet period (under an active
    /// sequence it extends until the sequence drains).
    ///
    /// # Errors
    ///
    /// [`Error::BadRegister`] if `index` is outside the list.
    pub fn load(&self, index: usize, packet: Packet) -> Result<(), Error> {
        if index >= N {
            return Err(Error::BadRegister);
        }
        while self.next_reg.load(Ordering::Acquire) != NO_PENDING {
            spin_loop();
        }
        self.regs[index].write_update(packet);
        if index > self.max_loaded.load(Ordering::Relaxed) {
            self.max_loaded.store(index, Ordering::Release);
        }
        self.next_reg.store(index, Ordering::Release);
        trace!(
            "loaded register {index}: {} bits, {} repeats",
            packet.len(),
            packet.repeats()
        );
        Ok(())
    }

    /// Schedules a preemptive packet sequence.
    ///
    /// While active, the sequence fully preempts rotation *and* the
    /// one-shot register: its entries go out back to back, each transmitted
    /// `max(1, repeats)` times, with no other packet interleaved. When the
    /// last repeat of the last entry completes the sequence clears itself
    /// and rotation resumes where it left off.
    ///
    /// # Errors
    ///
    /// [`Error::SequenceActive`] while a sequence is outstanding (wait with
    /// [`wait_for_sequence`](Self::wait_for_sequence)), [`Error::Empty`] /
    /// [`Error::SequenceTooLong`] for degenerate input.
    pub fn schedule_sequence(&self, packets: &[Packet]) -> Result<(), Error> {
        if packets.is_empty() {
            return Err(Error::Empty);
        }
        if packets.len() > MAX_SEQUENCE {
            return Err(Error::SequenceTooLong);
        }
        if self.seq_remaining.load(Ordering::Acquire) != 0 {
            return Err(Error::SequenceActive);
        }
        // Bumping the generation first lets the consumer discard a copy
        // raced against a kill/reschedule pair.
        self.seq_gen.fetch_add(1, Ordering::Release);
        // SAFETY: the array is producer-owned while `seq_remaining` is zero;
        // the Release store below publishes it to the consumer.
        let seq = unsafe { &mut *self.seq.get() };
        seq[..packets.len()].copy_from_slice(packets);
        self.seq_len.store(packets.len(), Ordering::Relaxed);
        self.seq_remaining.store(packets.len(), Ordering::Release);
        debug!("scheduled sequence of {} packets", packets.len());
        Ok(())
    }

    /// Entries of the active sequence not yet fully transmitted.
    pub fn sequence_remaining(&self) -> usize {
        self.seq_remaining.load(Ordering::Acquire)
    }

    /// Busy-polls until at most `expected` sequence entries remain.
    ///
    /// Producer-side only; used by programming exchanges that must know the
    /// packets have physically gone out before sampling track current.
    /// There is no deadline; callers wanting a timeout layer one on top.
    pub fn wait_for_sequence(&self, expected: usize) {
        while self.seq_remaining.load(Ordering::Acquire) > expected {
            spin_loop();
        }
    }

    /// Forcibly clears an active sequence.
    ///
    /// The packet currently on the wire finishes cleanly; rotation resumes
    /// at the next boundary. Not needed for ordinary completion.
    pub fn kill_sequence(&self) {
        self.seq_remaining.store(0, Ordering::Release);
        debug!("sequence killed");
    }

    // ------------------------------------------------------------------
    // Consumer side (single real-time context)
    // ------------------------------------------------------------------

    /// Returns the next bit to put on the rails.
    ///
    /// Runs the advance decision when the current packet is exhausted.
    /// O(1), never blocks; this is the call made every signal half-period
    /// by the timer driver.
    #[inline]
    pub fn next_bit(&self) -> bool {
        // SAFETY: cursor is owned by the single consumer context.
        let cur = unsafe { &mut *self.cursor.get() };
        if cur.bit >= cur.packet.len() {
            self.advance(cur);
        }
        let bit = cur.packet.bit(cur.bit);
        cur.bit += 1;
        bit
    }

    /// Returns the next eight bits, packed MSB-first.
    ///
    /// For drivers that stage a byte's worth of pulse descriptors at a
    /// time; the ragged tail of a packet is zero-filled.
    #[inline]
    pub fn next_byte(&self) -> u8 {
        // SAFETY: cursor is owned by the single consumer context.
        let cur = unsafe { &mut *self.cursor.get() };
        if cur.bit >= cur.packet.len() {
            self.advance(cur);
        }
        let byte = cur.packet.byte(cur.bit / 8);
        cur.bit += 8;
        byte
    }

    /// Returns the whole packet that should transmit next.
    ///
    /// For drivers that submit entire packets to a pulse peripheral in one
    /// go. Each call accounts for one transmission, so repeats and sequence
    /// entries are honored exactly as with bitwise pulls.
    pub fn next_packet(&self) -> Packet {
        // SAFETY: cursor is owned by the single consumer context.
        let cur = unsafe { &mut *self.cursor.get() };
        self.advance(cur);
        cur.bit = cur.packet.len();
        cur.packet
    }

    /// The advance decision. Entered only at packet boundaries.
    fn advance(&self, cur: &mut Cursor) {
        cur.bit = 0;

        // 1. An active sequence preempts everything, register 0 included.
        if self.sequence_step(cur) {
            return;
        }

        // 2. One-shot register still owes repeats. Re-copy the packet: a
        //    sequence may have interluded since the last transmission.
        if cur.reg == 0 && cur.reg0_repeats_left > 0 {
            cur.reg0_repeats_left -= 1;
            cur.packet = self.regs[0].active_copy();
            return;
        }

        // 3. A freshly loaded register preempts plain rotation so new
        //    throttle settings reach the rails as soon as possible.
        let pending = self.next_reg.load(Ordering::Acquire);
        if pending != NO_PENDING {
            cur.reg = pending;
            cur.packet = self.regs[pending].adopt();
            cur.reg0_repeats_left = if pending == 0 {
                cur.packet.repeats().saturating_sub(1)
            } else {
                0
            };
            // Clearing the mailbox after the flip unblocks the producer.
            self.next_reg.store(NO_PENDING, Ordering::Release);
            return;
        }

        // 4. Round robin over registers 1..=max_loaded; register 0 is
        //    never entered by plain rotation.
        let max = self.max_loaded.load(Ordering::Acquire);
        cur.reg = if cur.reg >= max { 1 } else { cur.reg + 1 };
        cur.packet = self.regs[cur.reg].active_copy();
    }

    /// Sequence half of the advance decision. Returns true if the cursor
    /// now points at a sequence packet.
    fn sequence_step(&self, cur: &mut Cursor) -> bool {
        let remaining = self.seq_remaining.load(Ordering::Acquire);
        if remaining == 0 {
            cur.seq_active = false;
            return false;
        }
        let total = self.seq_len.load(Ordering::Relaxed);
        let gen = self.seq_gen.load(Ordering::Relaxed);
        // A kill/reschedule racing this boundary can leave the snapshots
        // mismatched; settle at the next boundary instead of indexing out
        // of bounds.
        let Some(pos) = total.checked_sub(remaining) else {
            cur.seq_active = false;
            return false;
        };

        if cur.seq_active && cur.seq_gen == gen && cur.seq_pos == pos {
            if cur.seq_repeats_left > 0 {
                cur.seq_repeats_left -= 1;
                return true;
            }
            // Entry exhausted: release it. A concurrent kill may already
            // have zeroed the counter; checked_sub keeps it there.
            match self
                .seq_remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
            {
                Ok(prev) if prev > 1 => match total.checked_sub(prev - 1) {
                    Some(pos) => self.adopt_sequence_entry(cur, gen, pos),
                    None => {
                        cur.seq_active = false;
                        false
                    }
                },
                _ => {
                    cur.seq_active = false;
                    false
                }
            }
        } else {
            // Newly armed sequence, or rescheduled after a kill.
            self.adopt_sequence_entry(cur, gen, pos)
        }
    }

    fn adopt_sequence_entry(&self, cur: &mut Cursor, gen: usize, pos: usize) -> bool {
        // SAFETY: entries are rewritten only while the sequence is
        // inactive; the recheck below discards a copy that raced a
        // kill/reschedule pair.
        let packet = unsafe { (*self.seq.get())[pos] };
        if self.seq_gen.load(Ordering::Acquire) != gen
            || self.seq_remaining.load(Ordering::Acquire) == 0
        {
            cur.seq_active = false;
            return false;
        }
        cur.seq_active = true;
        cur.seq_gen = gen;
        cur.seq_pos = pos;
        cur.packet = packet;
        cur.seq_repeats_left = packet.repeats().saturating_sub(1);
        true
    }
}

impl<const N: usize> Default for RegisterList<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(tag: u8) -> Packet {
        Packet::encode(&[0x03, tag, 0x03 ^ tag], 0).unwrap()
    }

    fn packet_repeats(tag: u8, repeats: u8) -> Packet {
        Packet::encode(&[0x03, tag, 0x03 ^ tag], repeats).unwrap()
    }

    #[test]
    fn fresh_list_transmits_idle() {
        let regs: RegisterList<4> = RegisterList::new();
        let idle = Packet::idle();
        for i in 0..idle.len() {
            assert_eq!(regs.next_bit(), idle.bit(i), "bit {i}");
        }
    }

    #[test]
    fn load_takes_effect_at_next_boundary_only() {
        let regs: RegisterList<4> = RegisterList::new();
        let p = packet(0x55);

        // Drain half of the initial idle packet, then load.
        for _ in 0..20 {
            regs.next_bit();
        }
        regs.load(1, p).unwrap();

        // The in-flight idle packet finishes untouched.
        let idle = Packet::idle();
        for i in 20..idle.len() {
            assert_eq!(regs.next_bit(), idle.bit(i), "idle bit {i}");
        }
        // The very next packet is the loaded one.
        for i in 0..p.len() {
            assert_eq!(regs.next_bit(), p.bit(i), "loaded bit {i}");
        }
    }

    #[test]
    fn round_robin_order() {
        let regs: RegisterList<4> = RegisterList::new();
        let (p1, p2, p3) = (packet(1), packet(2), packet(3));
        regs.load(1, p1).unwrap();
        regs.next_packet(); // adopt 1
        regs.load(2, p2).unwrap();
        regs.next_packet(); // adopt 2
        regs.load(3, p3).unwrap();
        regs.next_packet(); // adopt 3

        // With no pending swaps left, rotation is 1,2,3,1,2,3...
        for expected in [&p1, &p2, &p3, &p1, &p2, &p3] {
            assert_eq!(regs.next_packet(), *expected);
        }
    }

    #[test]
    fn register_zero_repeats_then_resumes_rotation() {
        let regs: RegisterList<4> = RegisterList::new();
        let cruise = packet(0x10);
        regs.load(1, cruise).unwrap();
        regs.next_packet();

        let oneshot = packet_repeats(0x77, 3);
        regs.load(0, oneshot).unwrap();
        for _ in 0..3 {
            assert_eq!(regs.next_packet(), oneshot);
        }
        // Budget exhausted: back to the rotation register.
        assert_eq!(regs.next_packet(), cruise);
        assert_eq!(regs.next_packet(), cruise);
    }

    #[test]
    fn repeat_zero_and_one_both_send_once() {
        let regs: RegisterList<4> = RegisterList::new();
        let cruise = packet(0x10);
        regs.load(1, cruise).unwrap();
        regs.next_packet();

        for repeats in [0u8, 1] {
            let oneshot = packet_repeats(0x99, repeats);
            regs.load(0, oneshot).unwrap();
            assert_eq!(regs.next_packet(), oneshot);
            assert_eq!(regs.next_packet(), cruise);
        }
    }

    #[test]
    fn sequence_preempts_and_self_clears() {
        let regs: RegisterList<4> = RegisterList::new();
        let cruise = packet(0x10);
        regs.load(1, cruise).unwrap();
        regs.next_packet();

        let a = packet_repeats(0xA0, 2);
        let b = packet_repeats(0xB0, 3);
        regs.schedule_sequence(&[a, b]).unwrap();

        assert_eq!(regs.next_packet(), a);
        assert_eq!(regs.next_packet(), a);
        assert_eq!(regs.sequence_remaining(), 2);
        assert_eq!(regs.next_packet(), b);
        assert_eq!(regs.next_packet(), b);
        assert_eq!(regs.next_packet(), b);
        // Counter hits zero exactly when the last repeat completes.
        assert_eq!(regs.sequence_remaining(), 1);
        assert_eq!(regs.next_packet(), cruise);
        assert_eq!(regs.sequence_remaining(), 0);
    }

    #[test]
    fn second_sequence_rejected_while_active() {
        let regs: RegisterList<4> = RegisterList::new();
        regs.schedule_sequence(&[packet(1)]).unwrap();
        assert_eq!(
            regs.schedule_sequence(&[packet(2)]),
            Err(Error::SequenceActive)
        );
    }

    #[test]
    fn bad_register_and_degenerate_sequences_rejected() {
        let regs: RegisterList<4> = RegisterList::new();
        assert_eq!(regs.load(4, packet(1)), Err(Error::BadRegister));
        assert_eq!(regs.schedule_sequence(&[]), Err(Error::Empty));
        let long = [packet(1); MAX_SEQUENCE + 1];
        assert_eq!(regs.schedule_sequence(&long), Err(Error::SequenceTooLong));
    }

    #[test]
    fn kill_clears_sequence_and_rotation_resumes() {
        let regs: RegisterList<4> = RegisterList::new();
        let cruise = packet(0x10);
        regs.load(1, cruise).unwrap();
        regs.next_packet();

        let a = packet_repeats(0xA0, 5);
        regs.schedule_sequence(&[a, packet(0xB0)]).unwrap();
        assert_eq!(regs.next_packet(), a);
        regs.kill_sequence();
        assert_eq!(regs.sequence_remaining(), 0);
        assert_eq!(regs.next_packet(), cruise);
    }

    #[test]
    fn max_loaded_extends_and_wraps() {
        let regs: RegisterList<6> = RegisterList::new();
        regs.load(5, packet(5)).unwrap();
        regs.next_packet(); // adopt 5
        assert_eq!(regs.max_loaded(), 5);
        // Wraps to 1, then walks idle registers 2..4 up to 5 again.
        assert_eq!(regs.next_packet(), Packet::idle());
        for _ in 2..=4 {
            assert_eq!(regs.next_packet(), Packet::idle());
        }
        assert_eq!(regs.next_packet(), packet(5));
    }
}
