// Frame decoder
//
// Reassembles delimiter-terminated JSON frames from arbitrarily split or
// merged byte chunks. Pure and synchronous; `FlowStream` drives it.

use super::record::{parse_frame, FlowBatch};
use tracing::{debug, warn};

/// Terminator the agent appends after every frame
pub const FRAME_DELIMITER: &str = "|;|";

/// Counters for one decoder instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub records_dropped: u64,
}

#[derive(Debug)]
pub struct FrameDecoder {
    delimiter: String,
    window_seconds: u32,
    /// Decoded text not yet terminated by a delimiter
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk
    utf8_tail: Vec<u8>,
    /// Offset in `buffer` before which no delimiter can start
    scan_from: usize,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new(window_seconds: u32) -> Self {
        Self::with_delimiter(FRAME_DELIMITER, window_seconds)
    }

    /// An empty delimiter falls back to `FRAME_DELIMITER`
    pub fn with_delimiter(delimiter: impl Into<String>, window_seconds: u32) -> Self {
        let mut delimiter = delimiter.into();
        if delimiter.is_empty() {
            delimiter = FRAME_DELIMITER.to_string();
        }
        Self {
            delimiter,
            window_seconds,
            buffer: String::new(),
            utf8_tail: Vec::new(),
            scan_from: 0,
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes held back waiting for more input (text plus partial UTF-8)
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.utf8_tail.len()
    }

    /// Feed one chunk; returns every batch completed by it, in arrival order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FlowBatch> {
        self.decode_utf8(chunk);
        self.split_frames()
    }

    /// End of input: whatever is still buffered can never complete
    pub fn finish(&mut self) {
        let leftover = self.buffered_len();
        if leftover > 0 {
            debug!(target: "stream", bytes = leftover, "Discarding unterminated frame at end of stream");
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.utf8_tail.clear();
        self.scan_from = 0;
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let joined;
        let mut rest: &[u8] = if self.utf8_tail.is_empty() {
            chunk
        } else {
            let mut bytes = std::mem::take(&mut self.utf8_tail);
            bytes.extend_from_slice(chunk);
            joined = bytes;
            &joined
        };

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for the next chunk
                            self.utf8_tail = rest[valid..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn split_frames(&mut self) -> Vec<FlowBatch> {
        let mut batches = Vec::new();
        let mut start = 0;
        let mut search = self.scan_from;
        let window_seconds = self.window_seconds;

        while let Some(found) = self.buffer[search..].find(self.delimiter.as_str()) {
            let end = search + found;
            let segment = &self.buffer[start..end];
            if let Some(batch) = parse_segment(&mut self.stats, window_seconds, segment) {
                batches.push(batch);
            }
            start = end + self.delimiter.len();
            search = start;
        }

        self.buffer.drain(..start);

        // A delimiter may straddle this chunk and the next one
        let mut resume = self.buffer.len().saturating_sub(self.delimiter.len() - 1);
        while !self.buffer.is_char_boundary(resume) {
            resume -= 1;
        }
        self.scan_from = resume;

        batches
    }
}

fn parse_segment(stats: &mut DecoderStats, window_seconds: u32, segment: &str) -> Option<FlowBatch> {
    if segment.trim().is_empty() {
        return None;
    }
    match parse_frame(segment, window_seconds) {
        Ok((batch, dropped)) => {
            stats.frames_decoded += 1;
            stats.records_dropped += dropped as u64;
            Some(batch)
        }
        Err(e) => {
            stats.frames_dropped += 1;
            warn!(
                target: "stream",
                error = %e,
                bytes = segment.len(),
                "Dropping malformed frame"
            );
            None
        }
    }
}
