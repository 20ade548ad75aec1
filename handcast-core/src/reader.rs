//! Reassembles complete payloads from arbitrarily fragmented socket reads.
//!
//! Pure state machine: the caller reads from its socket, calls [`StreamReader::feed`],
//! then drains complete payloads with [`StreamReader::next_frame`] until it returns
//! `None`. Zero-length reads (peer close) are the caller's concern; the reader only
//! sees bytes.

use crate::wire::{LEN_SIZE, MAX_FRAME_LEN};

/// Declared payload length exceeds [`MAX_FRAME_LEN`]. The length prefix is
/// corrupt or hostile; accumulating toward it would grow without bound, so
/// the connection must be torn down.
#[derive(Debug, thiserror::Error)]
#[error("declared payload length {0} exceeds maximum {MAX_FRAME_LEN}")]
pub struct FrameTooLarge(pub u64);

/// One instance per connection; never shared.
#[derive(Debug, Default)]
pub struct StreamReader {
    buf: Vec<u8>,
}

impl StreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk as read from the socket. Never blocks.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete payload, consuming exactly
    /// `LEN_SIZE + payload_len` bytes from the front of the buffer.
    /// Returns `Ok(None)` without consuming anything when the buffer does
    /// not yet hold a full message.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameTooLarge> {
        if self.buf.len() < LEN_SIZE {
            return Ok(None);
        }
        let mut prefix = [0u8; LEN_SIZE];
        prefix.copy_from_slice(&self.buf[..LEN_SIZE]);
        let declared = u64::from_be_bytes(prefix);
        if declared > MAX_FRAME_LEN {
            return Err(FrameTooLarge(declared));
        }
        let total = LEN_SIZE + declared as usize;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload = self.buf[LEN_SIZE..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(payload))
    }

    /// Bytes currently buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
