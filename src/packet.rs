//! DCC packet representation and bit-level framing.
//!
//! A [`Packet`] is one complete DCC frame as it appears on the rails: the
//! preamble, a start bit in front of every data byte, and the data bytes
//! themselves (address, instruction(s), XOR error byte). Packets are built
//! once by the command layer and never modified afterwards; the only mutable
//! aspect of transmission, the repeat countdown, is tracked by the consumer
//! that pulls bits, not inside the packet.
//!
//! # Framing convention
//!
//! The bit image stores the full physical frame *except* the trailing
//! packet-end bit: 22 preamble `1`s, then for each byte a `0` start bit
//! followed by the 8 data bits (MSB first). The packet-end `1` is supplied
//! by the next packet's preamble, so back-to-back packets form a legal
//! continuous stream. A framed packet is therefore `22 + 9 × nbytes` bits
//! long, which caps the payload at [`MAX_PAYLOAD_BYTES`] bytes inside the
//! [`MAX_PACKET_BITS`]-bit buffer.
//!
//! Callers are responsible for the NMRA XOR checksum byte; see
//! [`crate::ops::checksum`].
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::Packet;
//!
//! // The standard idle frame: 0xFF 0x00 plus its checksum.
//! let idle = Packet::idle();
//! assert_eq!(idle.len(), 22 + 3 * 9);
//! // Preamble bits are all ones, the first start bit is a zero.
//! assert!(idle.bit(0) && idle.bit(21));
//! assert!(!idle.bit(22));
//! ```

use bitvec::prelude::*;

use crate::Error;

/// Size of the packed bit buffer in bytes.
pub const MAX_PACKET_BYTES: usize = 10;

/// Maximum framed packet length in bits.
pub const MAX_PACKET_BITS: usize = MAX_PACKET_BYTES * 8;

/// Preamble length in bits.
pub const PREAMBLE_BITS: usize = 22;

/// Maximum payload (address + data + checksum) that fits once framed.
pub const MAX_PAYLOAD_BYTES: usize = 6;

/// Packed bit image of a framed packet.
pub type PacketBits = BitArr!(for 80, in u8, Msb0);

const IDLE_PAYLOAD: [u8; 3] = [0xFF, 0x00, 0xFF];
const RESET_PAYLOAD: [u8; 3] = [0x00, 0x00, 0x00];

/// One complete, framed DCC packet plus its transmission budget.
///
/// `Packet` is a small `Copy` value (12 bytes) so the real-time consumer can
/// take a private copy at each packet boundary instead of sharing mutable
/// state with the command layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet {
    bits: PacketBits,
    len: u8,
    repeats: u8,
}

impl Packet {
    /// Frames a checksummed payload into a transmittable packet.
    ///
    /// `repeats` is the total transmission budget when the packet is sent
    /// through the one-shot register or a priority sequence; `0` and `1`
    /// both mean "send once". Continuous throttle registers ignore it.
    ///
    /// # Errors
    ///
    /// [`Error::Empty`] for an empty payload, [`Error::TooLong`] beyond
    /// [`MAX_PAYLOAD_BYTES`] bytes. Both are caller programming errors.
    pub fn encode(payload: &[u8], repeats: u8) -> Result<Self, Error> {
        if payload.is_empty() {
            return Err(Error::Empty);
        }
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(Error::TooLong);
        }
        Ok(Self::frame(payload, repeats))
    }

    /// Wraps an already-framed bit image.
    ///
    /// Used by command layers that carry pre-encoded packets (the raw form
    /// of the station's load entry point). Bits beyond `bit_count` are
    /// cleared so equal packets compare equal.
    pub fn from_bits(buf: &[u8], bit_count: usize, repeats: u8) -> Result<Self, Error> {
        if bit_count == 0 {
            return Err(Error::Empty);
        }
        let nbytes = bit_count.div_ceil(8);
        if bit_count > MAX_PACKET_BITS || nbytes > buf.len() {
            return Err(Error::TooLong);
        }
        let mut bits = PacketBits::ZERO;
        bits.as_raw_mut_slice()[..nbytes].copy_from_slice(&buf[..nbytes]);
        bits[bit_count..].fill(false);
        Ok(Self {
            bits,
            len: bit_count as u8,
            repeats,
        })
    }

    /// The standard idle packet, addressed to no decoder. Sent continuously
    /// to keep the rails powered when no real traffic is pending.
    pub fn idle() -> Self {
        Self::frame(&IDLE_PAYLOAD, 0)
    }

    /// The broadcast decoder-reset packet used by service-mode exchanges.
    pub fn reset() -> Self {
        Self::frame(&RESET_PAYLOAD, 0)
    }

    // Infallible framing core; callers have validated the payload length.
    fn frame(payload: &[u8], repeats: u8) -> Self {
        let mut bits = PacketBits::ZERO;
        bits[..PREAMBLE_BITS].fill(true);
        let mut pos = PREAMBLE_BITS;
        for byte in payload {
            bits.set(pos, false);
            pos += 1;
            bits[pos..pos + 8].copy_from_bitslice([*byte].view_bits::<Msb0>());
            pos += 8;
        }
        Self {
            bits,
            len: pos as u8,
            repeats,
        }
    }

    /// Framed length in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True if the packet holds no framed bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total transmission budget for one-shot and sequence use.
    #[inline]
    pub fn repeats(&self) -> u8 {
        self.repeats
    }

    /// Reads one bit of the framed image.
    #[inline]
    pub fn bit(&self, index: usize) -> bool {
        debug_assert!(index < self.len as usize);
        self.bits[index]
    }

    /// Reads one packed byte of the framed image.
    ///
    /// Byte-granularity drivers transmit whole bytes; the ragged tail of
    /// the final byte is zero-filled.
    #[inline]
    pub fn byte(&self, index: usize) -> u8 {
        self.bits.as_raw_slice()[index]
    }

    /// View of the framed bits, mainly for assertions in tests.
    pub fn as_bitslice(&self) -> &BitSlice<u8, Msb0> {
        &self.bits[..self.len as usize]
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::idle()
    }
}
