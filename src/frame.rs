//! Finds `@...!` command frames in the receive ring buffer.
//!
//! Extraction works in place: bytes in front of a start marker are dropped,
//! but the frame itself stays in the buffer until [`RingBuffer::take_frame`]
//! pulls it out.

use crate::ring::RingBuffer;

pub const FRAME_START: u8 = b'@';
pub const FRAME_END: u8 = b'!';
/// Every command frame starts with this tag.
pub const FRAME_TAG: &[u8] = b"@ZB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    #[error("no frame has been extracted")]
    NoFrame,
    #[error("frame of {len} bytes does not fit in {max}")]
    TooLong { len: usize, max: usize },
    #[error("frame does not start with the command tag")]
    MissingPrefix,
    #[error("frame does not end with the end marker")]
    MissingEnd,
    #[error("frame contains more than one end marker")]
    DuplicateEnd,
}

impl FrameError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FrameError::NoFrame => "no frame",
            FrameError::TooLong { .. } => "too long",
            FrameError::MissingPrefix => "missing prefix",
            FrameError::MissingEnd => "missing end",
            FrameError::DuplicateEnd => "duplicate end",
        }
    }
}

impl<const C: usize> RingBuffer<C> {
    /// Look for a complete frame at the head of the unread bytes.
    ///
    /// Anything before a start marker is discarded for good. A start marker
    /// without an end marker yet is left in place for the next call, unless
    /// it already fills the buffer, in which case every unread byte is
    /// dropped. Returns the frame length, end marker included.
    pub fn try_extract(&mut self) -> Option<usize> {
        self.frame_len = None;

        while let Some(byte) = self.peek(0) {
            if byte == FRAME_START {
                let len = (1..self.available())
                    .find(|&offset| self.peek(offset) == Some(FRAME_END))
                    .map(|offset| offset + 1);
                match len {
                    Some(len) => debug!("frame found, {} bytes", len),
                    // A full buffer with no end marker can never complete, and
                    // the receive side refuses new bytes until it drains.
                    None if self.available() == self.capacity() => {
                        warn!("unterminated frame fills the buffer, dropping {} bytes", C);
                        self.clear();
                    }
                    None => {}
                }
                self.frame_len = len;
                return len;
            }

            trace!("discarding byte {}", byte);
            self.discard_one();
        }
        None
    }

    /// Length recorded by the last successful [`try_extract`](Self::try_extract).
    pub fn frame_len(&self) -> Option<usize> {
        self.frame_len
    }

    /// Pull the extracted frame into `out`.
    ///
    /// A frame that does not fit is still consumed, so the buffer never
    /// stalls on it.
    pub fn take_frame<'a>(&mut self, out: &'a mut [u8]) -> Result<&'a [u8], FrameError> {
        let len = self.frame_len.take().ok_or(FrameError::NoFrame)?;
        if len > out.len() {
            for _ in 0..len {
                self.discard_one();
            }
            return Err(FrameError::TooLong {
                len,
                max: out.len(),
            });
        }

        let pulled = self.pull(&mut out[..len]);
        Ok(&out[..pulled])
    }
}

/// Check that a frame carries the command tag and exactly one end marker,
/// which must be its last byte.
pub fn validate(frame: &[u8]) -> Result<(), FrameError> {
    if !frame.starts_with(FRAME_TAG) {
        return Err(FrameError::MissingPrefix);
    }
    if frame.last() != Some(&FRAME_END) {
        return Err(FrameError::MissingEnd);
    }
    if frame.iter().filter(|&&b| b == FRAME_END).count() != 1 {
        return Err(FrameError::DuplicateEnd);
    }
    Ok(())
}
