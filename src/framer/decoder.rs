//! Incremental event framer
//!
//! Turns arbitrarily split byte chunks into complete events. The transport
//! gives no framing help, so boundaries are found by counting consecutive
//! line terminators:
//!
//! ```text
//! bytes:    d a t a : _ 1 \r \n \r \n d a t a ...
//! run:      0 0 0 0 0 0 0  0  1  1  2 0 ...
//!                                   ^ boundary, block = [0, i]
//! ```
//!
//! `\n` increments the run, `\r` leaves it unchanged, any other byte resets
//! it. The run survives across chunks, so a boundary split as `...\n` +
//! `\n...` is still found.

use bytes::BytesMut;

use crate::error::{Error, Result};

use super::event::{parse_block, Event};

/// Default cap on the bytes of a single unterminated event (1 MiB)
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1024 * 1024;

/// Line terminators in a row that close an event
const BOUNDARY_RUN: u8 = 2;

/// Chunk-agnostic event framer
#[derive(Debug)]
pub struct EventFramer {
    /// Bytes of the event currently being assembled
    buffer: BytesMut,
    /// Consecutive line terminators seen so far
    newline_run: u8,
    /// Maximum buffered bytes before the stream is rejected
    max_size: usize,
    /// Overflow hit after events were completed in the same chunk
    overflowed: bool,
}

impl EventFramer {
    /// Create a framer with the default size limit
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_EVENT_SIZE)
    }

    /// Create a framer with a custom size limit
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            newline_run: 0,
            max_size,
            overflowed: false,
        }
    }

    /// Feed one chunk and collect every event it completes
    ///
    /// Bytes after the last boundary stay buffered for the next call. When
    /// those bytes exceed the size limit they are discarded; events completed
    /// earlier in the chunk are still returned and the overflow is reported
    /// by [`take_overflow`](Self::take_overflow) or by the next `push`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Event>> {
        if let Some(err) = self.take_overflow() {
            return Err(err);
        }

        let mut events = Vec::new();
        let mut start = 0;

        for (i, &byte) in chunk.iter().enumerate() {
            match byte {
                b'\n' => self.newline_run += 1,
                b'\r' => {}
                _ => self.newline_run = 0,
            }

            if self.newline_run == BOUNDARY_RUN {
                self.newline_run = 0;
                self.buffer.extend_from_slice(&chunk[start..=i]);
                events.extend(parse_block(&self.buffer));
                self.buffer.clear();
                start = i + 1;
            }
        }

        let rest = &chunk[start..];
        if self.buffer.len() + rest.len() > self.max_size {
            self.buffer.clear();
            self.newline_run = 0;
            if events.is_empty() {
                return Err(self.too_large());
            }
            self.overflowed = true;
            return Ok(events);
        }
        self.buffer.extend_from_slice(rest);

        Ok(events)
    }

    /// Take an overflow left pending by the last `push`
    pub fn take_overflow(&mut self) -> Option<Error> {
        std::mem::replace(&mut self.overflowed, false).then(|| self.too_large())
    }

    fn too_large(&self) -> Error {
        Error::EventTooLarge {
            limit: self.max_size,
        }
    }

    /// Number of bytes waiting for a boundary
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// End of input: any unterminated partial event is dropped silently
    pub fn finish(self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                bytes = self.buffer.len(),
                "Discarding unterminated event at end of stream"
            );
        }
    }
}

impl Default for EventFramer {
    fn default() -> Self {
        Self::new()
    }
}
