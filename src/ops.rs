//! DCC payload builders for the command integration layer.
//!
//! These produce the checksummed byte sequences that [`Packet::encode`]
//! frames for transmission: locomotive throttle and function instructions,
//! stationary accessory commands, and configuration-variable (CV) writes
//! and verifies for both the programming track (service mode) and the main
//! track (operations mode). The service-mode helpers return ready-made
//! packet sequences for the priority sequencer, shaped like a real
//! programming exchange: a burst of decoder resets, the instruction
//! repeated enough times for the decoder to act, then a recovery reset.
//!
//! Input validation lives here so malformed commands are rejected before
//! a packet ever reaches a register.
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::ops::{self, Direction};
//! use rs_dccgen::Packet;
//!
//! // Loco 3, half speed, forward, ready to load into a register.
//! let payload = ops::throttle(3, 63, Direction::Forward).unwrap();
//! let packet = Packet::encode(&payload, 0).unwrap();
//! assert_eq!(packet.len(), 22 + 4 * 9);
//! ```

use heapless::Vec;

use crate::packet::{Packet, MAX_PAYLOAD_BYTES};
use crate::sequencer::MAX_SEQUENCE;
use crate::Error;

/// A checksummed command payload, ready for [`Packet::encode`].
pub type Payload = Vec<u8, MAX_PAYLOAD_BYTES>;

/// A ready-to-schedule service-mode exchange.
pub type PacketSequence = Vec<Packet, MAX_SEQUENCE>;

/// Highest short (7-bit) locomotive address.
pub const MAX_SHORT_ADDRESS: u16 = 127;

/// Highest long (14-bit) locomotive address.
pub const MAX_LONG_ADDRESS: u16 = 10239;

/// Highest configuration variable number.
pub const MAX_CV: u16 = 1024;

/// Decoder resets sent before a service-mode instruction.
const SERVICE_LEAD_RESETS: u8 = 3;

/// Times a service-mode instruction is repeated.
const SERVICE_INSTRUCTION_REPEATS: u8 = 5;

/// Direction of travel encoded in speed instructions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Forward.
    #[default]
    Forward,
    /// Reverse.
    Reverse,
}

impl Direction {
    const fn bit(self) -> u8 {
        match self {
            Direction::Forward => 0x80,
            Direction::Reverse => 0x00,
        }
    }
}

/// NMRA XOR error-detection byte over a payload.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// 128-step speed/direction instruction.
///
/// `speed` is 0 (stop) to 126 (full); the reserved emergency-stop code is
/// produced by [`emergency_stop`] instead.
///
/// # Errors
///
/// [`Error::InvalidAddress`] outside 1..=[`MAX_LONG_ADDRESS`],
/// [`Error::InvalidSpeed`] above 126.
pub fn throttle(cab: u16, speed: u8, direction: Direction) -> Result<Payload, Error> {
    if speed > 126 {
        return Err(Error::InvalidSpeed);
    }
    let code = if speed == 0 { 0 } else { speed + 1 };
    with_address(cab, &[0x3F, direction.bit() | code])
}

/// Emergency-stop instruction for one locomotive.
pub fn emergency_stop(cab: u16, direction: Direction) -> Result<Payload, Error> {
    with_address(cab, &[0x3F, direction.bit() | 0x01])
}

/// Function-group instruction.
///
/// `instruction` is the raw function byte (F0-F4 group `0x80..=0x9F`,
/// F5-F8 `0xB0..=0xBF`, F9-F12 `0xA0..=0xAF`); the expanded F13+ groups use
/// `second` for their data byte.
pub fn function(cab: u16, instruction: u8, second: Option<u8>) -> Result<Payload, Error> {
    match second {
        Some(data) => with_address(cab, &[instruction, data]),
        None => with_address(cab, &[instruction]),
    }
}

/// Basic accessory (turnout) command.
///
/// # Errors
///
/// [`Error::InvalidAddress`] above 511, [`Error::InvalidValue`] for a
/// sub-address above 3.
pub fn accessory(address: u16, sub_address: u8, activate: bool) -> Result<Payload, Error> {
    if address > 511 {
        return Err(Error::InvalidAddress);
    }
    if sub_address > 3 {
        return Err(Error::InvalidValue);
    }
    let first = 0x80 | (address & 0x3F) as u8;
    let second =
        ((((address >> 6) & 0x07) as u8) << 4 | (sub_address << 1) | activate as u8) ^ 0xF8;
    sealed(&[first, second])
}

/// Service-mode direct CV byte write instruction.
pub fn cv_write_byte(cv: u16, value: u8) -> Result<Payload, Error> {
    let cv = cv_index(cv)?;
    sealed(&[0x7C | (cv >> 8) as u8, cv as u8, value])
}

/// Service-mode direct CV byte verify instruction.
pub fn cv_verify_byte(cv: u16, value: u8) -> Result<Payload, Error> {
    let cv = cv_index(cv)?;
    sealed(&[0x74 | (cv >> 8) as u8, cv as u8, value])
}

/// Service-mode direct CV bit write instruction.
pub fn cv_write_bit(cv: u16, bit: u8, value: bool) -> Result<Payload, Error> {
    let data = bit_manipulation(bit, value, true)?;
    let cv = cv_index(cv)?;
    sealed(&[0x78 | (cv >> 8) as u8, cv as u8, data])
}

/// Service-mode direct CV bit verify instruction.
pub fn cv_verify_bit(cv: u16, bit: u8, value: bool) -> Result<Payload, Error> {
    let data = bit_manipulation(bit, value, false)?;
    let cv = cv_index(cv)?;
    sealed(&[0x78 | (cv >> 8) as u8, cv as u8, data])
}

/// Operations-mode (main track) CV byte write for one locomotive.
pub fn cv_write_byte_main(cab: u16, cv: u16, value: u8) -> Result<Payload, Error> {
    let cv = cv_index(cv)?;
    with_address(cab, &[0xEC | (cv >> 8) as u8, cv as u8, value])
}

/// Operations-mode (main track) CV bit write for one locomotive.
pub fn cv_write_bit_main(cab: u16, cv: u16, bit: u8, value: bool) -> Result<Payload, Error> {
    let data = bit_manipulation(bit, value, true)?;
    let cv = cv_index(cv)?;
    with_address(cab, &[0xE8 | (cv >> 8) as u8, cv as u8, data])
}

/// Full service-mode exchange writing a CV byte.
///
/// Resets, the write instruction repeated, then a recovery reset, ready
/// for [`RegisterList::schedule_sequence`].
///
/// [`RegisterList::schedule_sequence`]: crate::RegisterList::schedule_sequence
pub fn service_mode_write_byte(cv: u16, value: u8) -> Result<PacketSequence, Error> {
    service_exchange(&cv_write_byte(cv, value)?)
}

/// Full service-mode exchange verifying a CV byte.
///
/// The caller samples track current after [`wait_for_sequence`] to detect
/// the decoder's acknowledgement pulse.
///
/// [`wait_for_sequence`]: crate::RegisterList::wait_for_sequence
pub fn service_mode_verify_byte(cv: u16, value: u8) -> Result<PacketSequence, Error> {
    service_exchange(&cv_verify_byte(cv, value)?)
}

/// Full service-mode exchange writing a single CV bit.
pub fn service_mode_write_bit(cv: u16, bit: u8, value: bool) -> Result<PacketSequence, Error> {
    service_exchange(&cv_write_bit(cv, bit, value)?)
}

/// Full service-mode exchange verifying a single CV bit.
pub fn service_mode_verify_bit(cv: u16, bit: u8, value: bool) -> Result<PacketSequence, Error> {
    service_exchange(&cv_verify_bit(cv, bit, value)?)
}

fn service_exchange(instruction: &[u8]) -> Result<PacketSequence, Error> {
    let mut seq = PacketSequence::new();
    let reset = &[0x00, 0x00];
    push(&mut seq, Packet::encode(&sealed(reset)?, SERVICE_LEAD_RESETS)?)?;
    push(
        &mut seq,
        Packet::encode(instruction, SERVICE_INSTRUCTION_REPEATS)?,
    )?;
    push(&mut seq, Packet::encode(&sealed(reset)?, 1)?)?;
    Ok(seq)
}

fn push(seq: &mut PacketSequence, packet: Packet) -> Result<(), Error> {
    seq.push(packet).map_err(|_| Error::SequenceTooLong)
}

/// Prepends the one- or two-byte locomotive address and seals the payload.
fn with_address(cab: u16, data: &[u8]) -> Result<Payload, Error> {
    if cab == 0 || cab > MAX_LONG_ADDRESS {
        return Err(Error::InvalidAddress);
    }
    let mut bytes: Vec<u8, MAX_PAYLOAD_BYTES> = Vec::new();
    if cab > MAX_SHORT_ADDRESS {
        bytes
            .push(0xC0 | (cab >> 8) as u8)
            .map_err(|_| Error::TooLong)?;
    }
    bytes.push(cab as u8).map_err(|_| Error::TooLong)?;
    bytes
        .extend_from_slice(data)
        .map_err(|_| Error::TooLong)?;
    sealed(&bytes)
}

/// Appends the XOR checksum to an instruction payload.
fn sealed(bytes: &[u8]) -> Result<Payload, Error> {
    let mut payload = Payload::new();
    payload
        .extend_from_slice(bytes)
        .map_err(|_| Error::TooLong)?;
    payload.push(checksum(bytes)).map_err(|_| Error::TooLong)?;
    Ok(payload)
}

/// Zero-based CV address, validated against 1..=[`MAX_CV`].
fn cv_index(cv: u16) -> Result<u16, Error> {
    if cv == 0 || cv > MAX_CV {
        return Err(Error::InvalidCv);
    }
    Ok(cv - 1)
}

/// Data byte of the bit-manipulation instruction: `111K DBBB`.
fn bit_manipulation(bit: u8, value: bool, write: bool) -> Result<u8, Error> {
    if bit > 7 {
        return Err(Error::InvalidValue);
    }
    let k = if write { 0x10 } else { 0x00 };
    Ok(0xE0 | k | (value as u8) << 3 | bit)
}
