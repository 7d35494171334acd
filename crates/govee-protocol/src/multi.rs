//! Multi-packet bulk write sequences
//!
//! Payloads larger than one frame go out under the `0xA3` command as
//! an indexed sequence: a start frame announcing the total frame
//! count, interior frames carrying the data, and a terminal frame
//! with the reserved index `0xFF` marking the end. The device
//! acknowledges the whole sequence with a single `a3 02` completion
//! frame once it has acted on it.

use bytes::Bytes;

use crate::frame::Frame;
use crate::types::{Command, ProtocolError};

/// Data bytes carried by the start frame after its 4-byte header.
pub const START_DATA: usize = 14;
/// Data bytes carried by each interior frame after its index byte.
pub const INTERIOR_DATA: usize = 17;
/// Reserved index of the terminal frame.
pub const TERMINAL_INDEX: u8 = 0xff;
/// Pseudo-register the completion acknowledgement responds from.
pub const COMPLETION_MARKER: u8 = 0x02;

/// A bulk payload split into its wire frames
#[derive(Debug, Clone)]
pub struct MultiPacketSequence {
    frames: Vec<Frame>,
}

impl MultiPacketSequence {
    /// Split a payload into a start frame, enough interior frames to
    /// hold the data, and an empty terminal frame.
    ///
    /// The frame count announced in the start header equals the
    /// number of frames produced. The last interior frame is
    /// zero-padded; the terminal frame never carries data. Some
    /// firmware revisions number the start frame 0x01 instead of
    /// 0x00, hence `start_index`.
    pub fn split(data: Bytes, start_index: u8) -> Result<Self, ProtocolError> {
        let interior = data.len().saturating_sub(START_DATA).div_ceil(INTERIOR_DATA);
        let total = u8::try_from(2 + interior)
            .map_err(|_| ProtocolError::PayloadTooLarge(data.len()))?;
        // Interior indices run up from the start index and must stay
        // clear of the terminal marker.
        if start_index as usize + interior >= TERMINAL_INDEX as usize {
            return Err(ProtocolError::PayloadTooLarge(data.len()));
        }

        let mut frames = Vec::with_capacity(total as usize);
        let (head, rest) = data.split_at(data.len().min(START_DATA));

        let mut payload = vec![start_index, 0x01, total, 0x02];
        payload.extend_from_slice(head);
        frames.push(Frame::new(Command::Multi, payload)?);

        for (offset, chunk) in rest.chunks(INTERIOR_DATA).enumerate() {
            let index = start_index + 1 + offset as u8;
            let mut payload = vec![index];
            payload.extend_from_slice(chunk);
            frames.push(Frame::new(Command::Multi, payload)?);
        }

        frames.push(Frame::new(Command::Multi, vec![TERMINAL_INDEX])?);
        Ok(Self { frames })
    }

    /// Frames in transmission order
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
