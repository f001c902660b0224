//! Output sinks and their fan-out multiplexer
//!
//! Sinks consume the decoded message stream in order and finish with the
//! session report. The multiplexer isolates sink failures: a sink that
//! errors is disabled with a logged error while the others keep the
//! stream.

pub mod json;
pub mod pcap;
pub mod text;

use crate::aggregate::SessionReport;
use crate::types::{DecodedMessage, Result};

/// One output destination for the decoded message stream
pub trait MessageSink {
    /// Short sink name for logs
    fn name(&self) -> &'static str;

    /// Consume one decoded message, in stream order
    fn write_message(&mut self, message: &DecodedMessage) -> Result<()>;

    /// Finish the session: flush buffers, write trailing sections
    fn close(&mut self, report: &SessionReport) -> Result<()>;
}

struct SinkSlot {
    sink: Box<dyn MessageSink>,
    failed: bool,
}

/// Ordered fan-out over all configured sinks
#[derive(Default)]
pub struct SinkMux {
    slots: Vec<SinkSlot>,
}

impl SinkMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Box<dyn MessageSink>) {
        self.slots.push(SinkSlot {
            sink,
            failed: false,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deliver one message to every live sink. A failing sink is
    /// disabled for the rest of the session; delivery never reorders.
    pub fn write_message(&mut self, message: &DecodedMessage) {
        for slot in &mut self.slots {
            if slot.failed {
                continue;
            }
            if let Err(e) = slot.sink.write_message(message) {
                log::error!("Sink '{}' failed, disabling it: {}", slot.sink.name(), e);
                slot.failed = true;
            }
        }
    }

    /// Close every live sink with the final session report
    pub fn close(&mut self, report: &SessionReport) {
        for slot in &mut self.slots {
            if slot.failed {
                continue;
            }
            if let Err(e) = slot.sink.close(report) {
                log::error!("Sink '{}' failed at close: {}", slot.sink.name(), e);
            }
        }
    }
}
