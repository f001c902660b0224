//! End-to-end decoding session
//!
//! Wires the stages together: reassembler, CRC validation, dispatch,
//! aggregation, sink fan-out. Single-threaded and synchronous; the byte
//! source feeding `feed` is the only blocking point. All state is
//! session-scoped, so concurrent sessions never share anything.

use crate::aggregate::{Aggregator, SessionReport};
use crate::config::DecoderConfig;
use crate::crc;
use crate::dispatch::Dispatcher;
use crate::framing::FrameReassembler;
use crate::sinks::{MessageSink, SinkMux};

/// One decoding session from raw transport bytes to closed sinks
pub struct DiagSession {
    reassembler: FrameReassembler,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    mux: SinkMux,
}

impl DiagSession {
    pub fn new(config: DecoderConfig, source_name: &str) -> Self {
        Self {
            reassembler: FrameReassembler::with_max_buffer(config.max_frame_buffer),
            dispatcher: Dispatcher::new(config),
            aggregator: Aggregator::new(source_name),
            mux: SinkMux::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn MessageSink>) {
        self.mux.add(sink);
    }

    /// Feed one chunk of raw transport bytes through the whole pipeline
    pub fn feed(&mut self, chunk: &[u8]) {
        for frame in self.reassembler.feed(chunk) {
            match crc::validate(&frame.bytes) {
                Some(payload) => {
                    self.aggregator.note_valid_frame();
                    for message in self.dispatcher.dispatch(payload) {
                        self.aggregator.observe(&message);
                        self.mux.write_message(&message);
                    }
                }
                None => {
                    self.aggregator.note_invalid_frame();
                }
            }
        }
    }

    /// Finish the session: close the sinks and return the final report.
    /// Bytes still waiting for a delimiter are an incomplete frame and
    /// are discarded with a log line.
    pub fn finish(mut self) -> SessionReport {
        let pending = self.reassembler.pending_len();
        if pending > 0 {
            log::warn!("Session ended with {} unframed bytes pending", pending);
        }
        let report = self.aggregator.report();
        self.mux.close(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{ESCAPE_XOR, FRAME_DELIMITER, FRAME_ESCAPE};

    /// Escape a validated payload and append CRC + delimiter
    fn frame(payload: &[u8]) -> Vec<u8> {
        let unescaped = crc::append_crc(payload);
        let mut out = Vec::new();
        for &b in &unescaped {
            if b == FRAME_DELIMITER || b == FRAME_ESCAPE {
                out.push(FRAME_ESCAPE);
                out.push(b ^ ESCAPE_XOR);
            } else {
                out.push(b);
            }
        }
        out.push(FRAME_DELIMITER);
        out
    }

    fn log_packet(log_code: u16, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x10, 0, 0, 0];
        out.extend_from_slice(&(body.len() as u16 + 12).to_le_bytes());
        out.extend_from_slice(&log_code.to_le_bytes());
        out.extend_from_slice(&(800u64 << 16).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_valid_frame_flows_to_report() {
        let mut session = DiagSession::new(DecoderConfig::default(), "unit");
        session.feed(&frame(&log_packet(0x1098, &[0x01, 0x90, 0x00])));
        let report = session.finish();
        assert_eq!(report.summary.valid_frames, 1);
        assert_eq!(report.summary.apdu_exchanges, 1);
    }

    #[test]
    fn test_corrupt_frame_counted_not_dispatched() {
        let mut session = DiagSession::new(DecoderConfig::default(), "unit");
        let mut wire = frame(&log_packet(0x1098, &[0x01, 0x90, 0x00]));
        wire[2] ^= 0xFF; // corrupt one byte inside the frame
        session.feed(&wire);
        let report = session.finish();
        assert_eq!(report.summary.invalid_frames, 1);
        assert_eq!(report.summary.total_messages, 0);
    }

    #[test]
    fn test_chunked_feed_equals_whole_feed() {
        let wire: Vec<u8> = [
            frame(&log_packet(0x1098, &[0x01, 0x90, 0x00])),
            frame(&log_packet(0x7777, &[0xAA])),
        ]
        .concat();

        let mut whole = DiagSession::new(DecoderConfig::default(), "unit");
        whole.feed(&wire);
        let whole_report = whole.finish();

        let mut bytewise = DiagSession::new(DecoderConfig::default(), "unit");
        for b in &wire {
            bytewise.feed(std::slice::from_ref(b));
        }
        let bytewise_report = bytewise.finish();

        assert_eq!(whole_report.summary.total_messages, 2);
        assert_eq!(
            whole_report.summary.total_messages,
            bytewise_report.summary.total_messages
        );
        assert_eq!(
            whole_report.summary.unknown_messages,
            bytewise_report.summary.unknown_messages
        );
    }

    #[test]
    fn test_messages_reach_sinks_in_order() {
        use crate::aggregate::SessionReport;
        use crate::sinks::MessageSink;
        use crate::types::{DecodedMessage, Result};
        use std::cell::RefCell;
        use std::rc::Rc;

        struct LabelSink {
            labels: Rc<RefCell<Vec<&'static str>>>,
        }
        impl MessageSink for LabelSink {
            fn name(&self) -> &'static str {
                "label"
            }
            fn write_message(&mut self, message: &DecodedMessage) -> Result<()> {
                self.labels.borrow_mut().push(message.body.label());
                Ok(())
            }
            fn close(&mut self, _report: &SessionReport) -> Result<()> {
                Ok(())
            }
        }

        let labels = Rc::new(RefCell::new(Vec::new()));
        let mut session = DiagSession::new(DecoderConfig::default(), "unit");
        session.add_sink(Box::new(LabelSink {
            labels: labels.clone(),
        }));
        session.feed(&frame(&log_packet(0x1098, &[0x01, 0x90, 0x00])));
        session.feed(&frame(&log_packet(0x1273, &[0x01, 0x00, 0x00, 0x00])));
        session.finish();

        assert_eq!(*labels.borrow(), vec!["RUIM Debug", "CM Phone Event"]);
    }

    #[test]
    fn test_event_frame_dispatch() {
        // One event record, full timestamp, 1-byte payload kind
        let id_field: u16 = 1606 | (1 << 13);
        let mut body = id_field.to_le_bytes().to_vec();
        body.extend_from_slice(&(800u64 << 16).to_le_bytes());
        body.push(0x02);
        let mut payload = vec![0x60];
        payload.extend_from_slice(&(body.len() as u16).to_le_bytes());
        payload.extend_from_slice(&body);

        let mut session = DiagSession::new(DecoderConfig::default(), "unit");
        session.feed(&frame(&payload));
        let report = session.finish();
        assert_eq!(report.summary.events, 1);
    }

    #[test]
    fn test_unknown_frames_forward_compatible() {
        let mut session = DiagSession::new(DecoderConfig::default(), "unit");
        session.feed(&frame(&log_packet(0x7777, &[0xAA, 0xBB])));
        let report = session.finish();
        assert_eq!(report.summary.unknown_messages, 1);
        assert_eq!(report.summary.total_messages, 1);
    }

    #[test]
    fn test_radio_frames_counted() {
        let mut session = DiagSession::new(DecoderConfig::default(), "unit");
        session.feed(&frame(&log_packet(0xB0E2, &[0x01])));
        let report = session.finish();
        assert_eq!(report.summary.radio_messages, 1);
    }
}
