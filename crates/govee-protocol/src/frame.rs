//! Wire frame structure and checksum handling

use crate::types::{Command, ProtocolError};

/// Every frame on the wire is exactly this long.
pub const FRAME_SIZE: usize = 20;

/// Command byte and checksum leave 18 bytes for the payload.
pub const MAX_PAYLOAD: usize = FRAME_SIZE - 2;

/// A single protocol frame
///
/// Frame format:
/// ```text
/// [Command: 1 byte] (0xAA read, 0x33 write, 0xA3 multi-packet, 0xA5 audio)
/// [Payload: 18 bytes, zero-padded on the right]
/// [Checksum: 1 byte] (XOR of the preceding 19 bytes)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame, rejecting payloads that cannot fit
    pub fn new(command: Command, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { command, payload })
    }

    /// Serialize to the 20-byte wire form
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut data = [0u8; FRAME_SIZE];
        data[0] = self.command.as_u8();
        data[1..=self.payload.len()].copy_from_slice(&self.payload);
        data[FRAME_SIZE - 1] = checksum(&data[..FRAME_SIZE - 1]);
        data
    }

    /// Deserialize from raw bytes
    ///
    /// The checksum is verified before anything else; a frame that
    /// fails it is rejected whole, never partially decoded. Unknown
    /// command tags are preserved rather than rejected, since the
    /// audio family is carried opaquely.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != FRAME_SIZE {
            return Err(ProtocolError::InvalidLength(data.len()));
        }

        let expected = checksum(&data[..FRAME_SIZE - 1]);
        let actual = data[FRAME_SIZE - 1];
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            command: Command::from_u8(data[0]),
            payload: data[1..FRAME_SIZE - 1].to_vec(),
        })
    }

    /// Payload with the trailing zero padding removed
    #[must_use]
    pub fn trimmed_payload(&self) -> &[u8] {
        let mut body = self.payload.as_slice();
        while let [rest @ .., 0] = body {
            body = rest;
        }
        body
    }
}

/// XOR checksum over the first 19 bytes of a frame
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |cs, &b| cs ^ b)
}
