//! Command station facade: two tracks, one API.
//!
//! [`CommandStation`] owns the register lists for the main operations track
//! and the programming track and exposes the narrow surface the command
//! layer drives: load a register, schedule a programming exchange, wait for
//! it, kill it. Signal drivers attach by borrowing a track's register list
//! ([`main_track`](CommandStation::main_track) /
//! [`prog_track`](CommandStation::prog_track)) at platform init time.
//!
//! The two tracks are fully independent (separate registers, separate
//! sequences, separate drivers), so programming exchanges never disturb
//! running trains.
//!
//! # Example
//!
//! ```rust
//! use rs_dccgen::{ops, CommandStation, Track};
//! use rs_dccgen::ops::Direction;
//!
//! let station = CommandStation::new();
//!
//! // Throttle for loco 3 into main-track register 1.
//! let payload = ops::throttle(3, 50, Direction::Forward).unwrap();
//! station
//!     .load_register(Track::Main, 1, &payload, 0)
//!     .unwrap();
//!
//! // A CV write exchange on the programming track.
//! let seq = ops::service_mode_write_byte(29, 0x06).unwrap();
//! station.schedule_sequence(Track::Programming, &seq).unwrap();
//! ```

use log::info;

use crate::packet::Packet;
use crate::sequencer::RegisterList;
use crate::Error;

/// Main-track register count: the one-shot register plus 12 throttle slots.
pub const MAIN_REGISTERS: usize = 13;

/// Programming-track register count: the one-shot register plus 2 slots.
pub const PROG_REGISTERS: usize = 3;

/// Which output circuit a command addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Track {
    /// The main operations track, driving running locomotives.
    Main,
    /// The programming track, used for one-at-a-time decoder setup.
    Programming,
}

/// The packet registers of both tracks behind the command-layer API.
pub struct CommandStation {
    main: RegisterList<MAIN_REGISTERS>,
    prog: RegisterList<PROG_REGISTERS>,
}

impl CommandStation {
    /// Creates a station with both tracks emitting the idle packet.
    ///
    /// Every register slot starts out holding the idle frame, so a driver
    /// attached before any command arrives already transmits valid DCC.
    pub fn new() -> Self {
        info!(
            "command station ready: {} main registers, {} programming registers",
            MAIN_REGISTERS - 1,
            PROG_REGISTERS - 1
        );
        Self {
            main: RegisterList::new(),
            prog: RegisterList::new(),
        }
    }

    /// The main track's register list, for driver attachment.
    pub fn main_track(&self) -> &RegisterList<MAIN_REGISTERS> {
        &self.main
    }

    /// The programming track's register list, for driver attachment.
    pub fn prog_track(&self) -> &RegisterList<PROG_REGISTERS> {
        &self.prog
    }

    /// Frames a checksummed payload and loads it into a register.
    ///
    /// Register 0 is the one-shot register: the packet is sent `repeats`
    /// times and rotation moves on. Registers 1.. are refreshed
    /// continuously.
    pub fn load_register(
        &self,
        track: Track,
        index: usize,
        payload: &[u8],
        repeats: u8,
    ) -> Result<(), Error> {
        let packet = Packet::encode(payload, repeats)?;
        self.load_packet(track, index, packet)
    }

    /// Loads a pre-framed bit image into a register.
    pub fn load_raw(
        &self,
        track: Track,
        index: usize,
        bytes: &[u8],
        bit_count: usize,
        repeats: u8,
    ) -> Result<(), Error> {
        let packet = Packet::from_bits(bytes, bit_count, repeats)?;
        self.load_packet(track, index, packet)
    }

    /// Loads an already-built packet into a register.
    pub fn load_packet(&self, track: Track, index: usize, packet: Packet) -> Result<(), Error> {
        match track {
            Track::Main => self.main.load(index, packet),
            Track::Programming => self.prog.load(index, packet),
        }
    }

    /// Schedules a preemptive packet sequence on a track.
    ///
    /// At most one sequence per track may be outstanding; see
    /// [`RegisterList::schedule_sequence`].
    pub fn schedule_sequence(&self, track: Track, packets: &[Packet]) -> Result<(), Error> {
        match track {
            Track::Main => self.main.schedule_sequence(packets),
            Track::Programming => self.prog.schedule_sequence(packets),
        }
    }

    /// Blocks until at most `expected` sequence entries remain on a track.
    pub fn wait_for_sequence(&self, track: Track, expected: usize) {
        match track {
            Track::Main => self.main.wait_for_sequence(expected),
            Track::Programming => self.prog.wait_for_sequence(expected),
        }
    }

    /// Sequence entries not yet fully transmitted on a track.
    pub fn sequence_remaining(&self, track: Track) -> usize {
        match track {
            Track::Main => self.main.sequence_remaining(),
            Track::Programming => self.prog.sequence_remaining(),
        }
    }

    /// Forcibly clears a track's active sequence.
    pub fn kill_sequence(&self, track: Track) {
        match track {
            Track::Main => self.main.kill_sequence(),
            Track::Programming => self.prog.kill_sequence(),
        }
    }
}

impl Default for CommandStation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{self, Direction};

    #[test]
    fn tracks_are_independent() {
        let station = CommandStation::new();
        let payload = ops::throttle(3, 50, Direction::Forward).unwrap();
        station
            .load_register(Track::Main, 1, &payload, 0)
            .unwrap();

        let seq = ops::service_mode_write_byte(29, 0x06).unwrap();
        station.schedule_sequence(Track::Programming, &seq).unwrap();

        // Main track rotation is unaffected by the programming sequence.
        assert_eq!(station.sequence_remaining(Track::Main), 0);
        assert_eq!(station.sequence_remaining(Track::Programming), 3);
        assert_eq!(
            station.main_track().next_packet(),
            Packet::encode(&payload, 0).unwrap()
        );
    }

    #[test]
    fn register_bounds_follow_track_size() {
        let station = CommandStation::new();
        let payload = ops::throttle(3, 10, Direction::Forward).unwrap();
        assert!(station
            .load_register(Track::Main, MAIN_REGISTERS - 1, &payload, 0)
            .is_ok());
        assert_eq!(
            station.load_register(Track::Main, MAIN_REGISTERS, &payload, 0),
            Err(Error::BadRegister)
        );
        assert_eq!(
            station.load_register(Track::Programming, PROG_REGISTERS, &payload, 0),
            Err(Error::BadRegister)
        );
    }

    #[test]
    fn kill_sequence_clears_only_that_track() {
        let station = CommandStation::new();
        let seq = ops::service_mode_verify_byte(1, 3).unwrap();
        station.schedule_sequence(Track::Programming, &seq).unwrap();
        station.kill_sequence(Track::Programming);
        assert_eq!(station.sequence_remaining(Track::Programming), 0);
    }
}
