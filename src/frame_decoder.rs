//! Splits the raw serial byte stream coming off the sink mote into
//! [`MoteFrame`]s.
//!
//! Frames look like `<START>TAG=SENSOR_DATA, ID=3, Light=500<END>` and may be
//! surrounded by any amount of noise: boot messages, half-written frames,
//! bytes that are not text at all. Text is accumulated across calls so a
//! frame split over two reads is still found once its end marker arrives.

use crate::mote_message_decoder::MoteFrame;
use log::{debug, warn};
use std::str::FromStr;

/// Opens a frame
pub const START_MARKER: &str = "<START>";
/// Closes a frame
pub const END_MARKER: &str = "<END>";
/// Default cap on text held between calls
pub const DEFAULT_MAX_BUFFERED: usize = 4096;

/// Accumulates stream text and pulls complete frames out of it.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: String,
    max_buffered: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED)
    }
}

impl FrameDecoder {
    /// A decoder that never keeps more than `max_buffered` bytes of
    /// unconsumed text around. Once exceeded, the oldest bytes go first.
    pub fn new(max_buffered: usize) -> Self {
        Self {
            buffer: String::new(),
            max_buffered,
        }
    }

    /// Append `bytes` to the buffer and return every frame that can now be
    /// decoded, in the order they appear in the stream.
    ///
    /// Non-ASCII bytes are dropped. A start/end pair is always removed from
    /// the buffer, together with anything before it, even when the payload
    /// does not parse.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<MoteFrame> {
        self.buffer
            .extend(bytes.iter().filter(|b| b.is_ascii()).map(|&b| b as char));

        let mut frames = Vec::new();
        while let Some(start) = self.buffer.find(START_MARKER) {
            let payload_start = start + START_MARKER.len();
            let Some(len) = self.buffer[payload_start..].find(END_MARKER) else {
                break;
            };
            let payload_end = payload_start + len;

            match MoteFrame::from_str(&self.buffer[payload_start..payload_end]) {
                Ok(frame) => frames.push(frame),
                Err(e) => debug!("Discarding malformed frame: {:?}", e),
            }

            self.buffer.drain(..payload_end + END_MARKER.len());
        }

        if self.buffer.len() > self.max_buffered {
            let excess = self.buffer.len() - self.max_buffered;
            warn!(
                "Frame buffer over {} bytes, dropping the oldest {}",
                self.max_buffered, excess
            );
            self.buffer.drain(..excess);
        }

        frames
    }

    /// Text received but not yet consumed by a complete frame
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Forget any partially received text.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
