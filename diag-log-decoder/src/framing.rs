//! Frame reassembly from a chunked byte stream
//!
//! The transport delivers delimiter-bounded, byte-escaped frames with no
//! alignment guarantees: a frame may be split across any number of read
//! chunks, and a chunk may contain any number of frames. The reassembler
//! carries partial state across `feed` calls so the emitted frames are
//! identical regardless of how the input was chunked.

use crate::types::RawFrame;

/// Frame delimiter byte (pinned protocol constant)
pub const FRAME_DELIMITER: u8 = 0x7E;
/// Escape byte; the following octet is transmitted XORed with 0x20
pub const FRAME_ESCAPE: u8 = 0x7D;
/// XOR applied to the octet following an escape byte
pub const ESCAPE_XOR: u8 = 0x20;

/// Default cap on the unresolved buffer; protects memory against
/// delimiter-free garbage input
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

/// Stateful deframer: `feed(chunk)` yields zero or more complete frames
pub struct FrameReassembler {
    buf: Vec<u8>,
    pending_escape: bool,
    resyncing: bool,
    max_buffer: usize,
    overflow_count: u64,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buf: Vec::new(),
            pending_escape: false,
            resyncing: false,
            max_buffer,
            overflow_count: 0,
        }
    }

    /// Feed a chunk of raw transport bytes; returns all frames completed
    /// by this chunk, in stream order. Trailer CRCs are not yet checked.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        let mut frames = Vec::new();

        for &b in chunk {
            if self.resyncing {
                // Discard until the stream realigns on a delimiter
                if b == FRAME_DELIMITER {
                    self.resyncing = false;
                    self.pending_escape = false;
                    self.buf.clear();
                }
                continue;
            }

            if self.pending_escape {
                self.pending_escape = false;
                if b == FRAME_DELIMITER {
                    // Escape immediately followed by a delimiter is an
                    // abort sequence; the partial frame is corrupt
                    log::warn!("Abort sequence in stream, discarding {} buffered bytes", self.buf.len());
                    self.buf.clear();
                } else {
                    self.buf.push(b ^ ESCAPE_XOR);
                }
            } else if b == FRAME_ESCAPE {
                // Held across chunk boundaries: an escape at the end of a
                // read is pending data, not corruption
                self.pending_escape = true;
            } else if b == FRAME_DELIMITER {
                if !self.buf.is_empty() {
                    frames.push(RawFrame::new(std::mem::take(&mut self.buf)));
                }
                // Back-to-back delimiters produce empty candidates; skip
            } else {
                self.buf.push(b);
            }

            if self.buf.len() > self.max_buffer {
                self.overflow_count += 1;
                log::warn!(
                    "Reassembly buffer exceeded {} bytes without a delimiter, resynchronizing (overflow #{})",
                    self.max_buffer,
                    self.overflow_count
                );
                self.buf.clear();
                self.pending_escape = false;
                self.resyncing = true;
            }
        }

        frames
    }

    /// Bytes currently buffered waiting for a closing delimiter
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Number of times the buffer cap forced a resynchronization
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(frames: &[&[u8]]) -> Vec<u8> {
        // Build an escaped wire image from unescaped frame bodies
        let mut out = Vec::new();
        for frame in frames {
            for &b in *frame {
                if b == FRAME_DELIMITER || b == FRAME_ESCAPE {
                    out.push(FRAME_ESCAPE);
                    out.push(b ^ ESCAPE_XOR);
                } else {
                    out.push(b);
                }
            }
            out.push(FRAME_DELIMITER);
        }
        out
    }

    #[test]
    fn test_single_frame() {
        let mut r = FrameReassembler::new();
        let frames = r.feed(&wire(&[&[0x10, 0x20, 0x30]]));
        assert_eq!(frames, vec![RawFrame::new(vec![0x10, 0x20, 0x30])]);
    }

    #[test]
    fn test_escaped_bytes_unescaped() {
        let mut r = FrameReassembler::new();
        let frames = r.feed(&wire(&[&[0x7E, 0x7D, 0x41]]));
        assert_eq!(frames, vec![RawFrame::new(vec![0x7E, 0x7D, 0x41])]);
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let stream = wire(&[&[0x10, 0x7E, 0x30], &[0x7D, 0x60, 0x00], &[0xAA; 40]]);

        let mut whole = FrameReassembler::new();
        let all_at_once = whole.feed(&stream);

        let mut bytewise = FrameReassembler::new();
        let mut one_at_a_time = Vec::new();
        for b in &stream {
            one_at_a_time.extend(bytewise.feed(std::slice::from_ref(b)));
        }

        assert_eq!(all_at_once.len(), 3);
        assert_eq!(all_at_once, one_at_a_time);
    }

    #[test]
    fn test_trailing_escape_held() {
        let mut r = FrameReassembler::new();
        // Escape as last byte of a chunk must be held, not dropped
        assert!(r.feed(&[0x41, FRAME_ESCAPE]).is_empty());
        let frames = r.feed(&[0x5E, FRAME_DELIMITER]);
        assert_eq!(frames, vec![RawFrame::new(vec![0x41, 0x7E])]);
    }

    #[test]
    fn test_empty_frames_skipped() {
        let mut r = FrameReassembler::new();
        let frames = r.feed(&[FRAME_DELIMITER, FRAME_DELIMITER, 0x01, FRAME_DELIMITER]);
        assert_eq!(frames, vec![RawFrame::new(vec![0x01])]);
    }

    #[test]
    fn test_overflow_resynchronizes() {
        let mut r = FrameReassembler::with_max_buffer(8);
        // 20 bytes of delimiter-free garbage blows the cap
        assert!(r.feed(&[0x55; 20]).is_empty());
        assert_eq!(r.overflow_count(), 1);
        // Still resyncing: data before the next delimiter is discarded
        assert!(r.feed(&[0x01, 0x02]).is_empty());
        // Stream recovers at the next delimiter
        let frames = r.feed(&[FRAME_DELIMITER, 0x10, 0x20, FRAME_DELIMITER]);
        assert_eq!(frames, vec![RawFrame::new(vec![0x10, 0x20])]);
    }

    #[test]
    fn test_abort_sequence_discards_frame() {
        let mut r = FrameReassembler::new();
        let frames = r.feed(&[0x41, 0x42, FRAME_ESCAPE, FRAME_DELIMITER, 0x10, FRAME_DELIMITER]);
        assert_eq!(frames, vec![RawFrame::new(vec![0x10])]);
    }
}
