//! Server-Sent Events (SSE) frame decoder
//!
//! Splits a raw byte stream into complete event frames, where a frame is the
//! text preceding each blank-line (`"\n\n"`) delimiter. Chunk boundaries
//! carry no meaning: delimiters and multi-byte characters may be split
//! across chunks, so bytes are buffered until a frame is complete and only
//! then decoded as UTF-8.

use tracing::{trace, warn};

use crate::error::{Result, SageError};

/// Frame delimiter per the backend's SSE contract
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Default cap on the residual buffer; a single frame larger than this
/// fails the stream rather than growing memory without bound.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental SSE frame decoder
///
/// Feed arrival-order byte chunks with [`FrameDecoder::push`]; each call
/// returns the frames completed by that chunk, in order. Call
/// [`FrameDecoder::finish`] at end-of-stream to discard any incomplete
/// trailing frame.
pub struct FrameDecoder {
    /// Residual bytes not yet terminated by a delimiter
    buffer: Vec<u8>,

    /// Maximum residual buffer size before the stream is failed
    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default frame size cap
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create a decoder with an explicit frame size cap
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Consume one chunk of bytes and return the frames it completed
    ///
    /// # Errors
    ///
    /// Returns [`SageError::Protocol`] if the undelimited remainder exceeds
    /// the configured frame size cap.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer) {
            let frame_bytes: Vec<u8> = self.buffer[..pos].to_vec();
            self.buffer.drain(..pos + FRAME_DELIMITER.len());

            // The delimiter is ASCII, so a complete frame is a complete
            // UTF-8 sequence unless the server sent invalid text.
            match String::from_utf8(frame_bytes) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    warn!("Dropping SSE frame with invalid UTF-8: {e}");
                }
            }
        }

        if self.buffer.len() > self.max_frame_bytes {
            return Err(SageError::Protocol(format!(
                "SSE frame exceeds {} bytes",
                self.max_frame_bytes
            )));
        }

        Ok(frames)
    }

    /// Signal end-of-stream, discarding any incomplete trailing frame
    pub fn finish(self) {
        if !self.buffer.is_empty() {
            trace!(
                "Discarding {} trailing bytes without frame delimiter",
                self.buffer.len()
            );
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the first `"\n\n"` in `haystack`
fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
}
