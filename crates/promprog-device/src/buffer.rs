//! Double-buffer chunk planning
//!
//! The programmer exposes one 4 KiB staging buffer, addressable in 256-byte
//! steps. Streaming operations split the device image into chunks of at
//! most half the buffer and alternate between the two halves, so the host
//! can transfer the next chunk over the wire while the device is still
//! executing the previous one.

use crate::error::{Error, Result};
use crate::protocol::{BUFFER_SIZE, OFFSET_STEP};

/// Maximum chunk length: one buffer half
pub const CHUNK_SIZE: usize = BUFFER_SIZE / 2;

/// One chunk of a streaming transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Which buffer half stages this chunk (0 or 1)
    pub half: u8,
    /// Byte offset of that half, in [`OFFSET_STEP`] units
    pub offset_steps: u8,
    /// Chunk length in bytes
    pub len: usize,
}

impl Chunk {
    /// Word count for the async read/program command covering this chunk.
    ///
    /// The chunk length must divide evenly by the profile's word width.
    pub fn word_count(&self, word_width: usize) -> Result<u16> {
        if self.len == 0 || self.len % word_width != 0 {
            return Err(Error::InvalidArgument(
                "chunk length is not a multiple of the word width",
            ));
        }
        Ok((self.len / word_width) as u16)
    }
}

/// Validate a buffer access before any I/O happens.
///
/// Offsets count 256-byte steps and must stay inside the buffer together
/// with the transfer length.
pub fn check_buffer_range(offset_steps: u8, len: usize) -> Result<()> {
    if offset_steps as usize >= BUFFER_SIZE / OFFSET_STEP {
        return Err(Error::InvalidArgument("buffer offset out of range"));
    }
    if len == 0 || len > BUFFER_SIZE {
        return Err(Error::InvalidArgument("transfer length out of range"));
    }
    if len > BUFFER_SIZE - offset_steps as usize * OFFSET_STEP {
        return Err(Error::InvalidArgument("transfer runs past end of buffer"));
    }
    Ok(())
}

/// Iterator over the chunk sequence for a transfer of `total_len` bytes
///
/// Produces halves 0, 1, 0, 1, ... with full-size chunks except possibly
/// the last.
pub struct Chunks {
    remaining: usize,
    index: usize,
}

impl Chunks {
    pub fn new(total_len: usize) -> Self {
        Self {
            remaining: total_len,
            index: 0,
        }
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(CHUNK_SIZE);
        let half = (self.index % 2) as u8;
        self.remaining -= len;
        self.index += 1;
        Some(Chunk {
            half,
            offset_steps: half * (CHUNK_SIZE / OFFSET_STEP) as u8,
            len,
        })
    }
}
