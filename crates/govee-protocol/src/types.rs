//! Common types used throughout the protocol

use thiserror::Error;

use crate::frame::Frame;
use crate::registers::{self, Register};

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid frame length: {0} bytes")]
    InvalidLength(usize),

    #[error("Checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Request timeout")]
    Timeout,

    #[error("Multi-packet sequence outcome unknown")]
    Indeterminate,

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Register {0:#04x} cannot encode this value")]
    UnsupportedRegister(u8),

    #[error("Transport not connected")]
    NotConnected,
}

/// Command tag, the first byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Read a register
    Read,
    /// Write a register
    Write,
    /// Multi-packet bulk write
    Multi,
    /// Audio family, opaque pass-through only
    Audio,
    /// Unrecognized tag, carried verbatim
    Other(u8),
}

/// Read command tag.
pub const CMD_READ: u8 = 0xaa;
/// Write command tag.
pub const CMD_WRITE: u8 = 0x33;
/// Multi-packet write command tag.
pub const CMD_MULTI: u8 = 0xa3;
/// Audio command tag. Not decoded.
pub const CMD_AUDIO: u8 = 0xa5;

impl Command {
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            CMD_READ => Command::Read,
            CMD_WRITE => Command::Write,
            CMD_MULTI => Command::Multi,
            CMD_AUDIO => Command::Audio,
            v => Command::Other(v),
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Command::Read => CMD_READ,
            Command::Write => CMD_WRITE,
            Command::Multi => CMD_MULTI,
            Command::Audio => CMD_AUDIO,
            Command::Other(v) => v,
        }
    }
}

/// A parsed acknowledgement: command echo, echoed address, content
///
/// Read acks carry the register content after the address; write acks
/// carry the address only (the device never echoes written content);
/// the multi-packet completion marker "responds from" pseudo-register
/// 0x02 with no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub command: Command,
    pub register: Register,
    pub content: Vec<u8>,
}

impl Acknowledgement {
    /// Parse an inbound frame into its acknowledgement shape.
    ///
    /// The device zero-pads every notification to the frame size, so
    /// trailing zeros are not significant and are stripped before the
    /// address is carved off. Returns `None` for frames from command
    /// families that never acknowledge (audio and unknown tags).
    #[must_use]
    pub fn parse(frame: &Frame) -> Option<Self> {
        match frame.command {
            Command::Read | Command::Write | Command::Multi => {}
            Command::Audio | Command::Other(_) => return None,
        }

        let body = frame.trimmed_payload();
        let (&register, rest) = body.split_first()?;

        // Sub-addressed registers echo a second address byte. The
        // multi completion marker is exempt: its 0x02 is the whole
        // address. A zero sub byte with all-zero content falls to the
        // padding trim entirely, so a missing sub reads as 0x00.
        let (register, content) =
            if frame.command != Command::Multi && registers::has_subregisters(register) {
                match rest.split_first() {
                    Some((&sub, rest)) => (Register::sub(register, sub), rest),
                    None => (Register::sub(register, 0x00), rest),
                }
            } else {
                (Register::plain(register), rest)
            };

        Some(Self {
            command: frame.command,
            register,
            content: content.to_vec(),
        })
    }
}
