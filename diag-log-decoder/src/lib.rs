//! DIAG Log Decoder Library
//!
//! A synchronous, session-scoped library for decoding vendor baseband
//! diagnostic byte streams (QMDL dumps or live transport reads) into a
//! canonical message model with fan-out to text, JSON, and packet
//! capture sinks.
//!
//! # Architecture
//!
//! The pipeline has five stages, each its own module:
//! - `framing` reassembles delimiter-bounded, byte-escaped frames from
//!   arbitrarily chunked input
//! - `crc` validates and strips the 16-bit frame trailer
//! - `dispatch` routes validated frames through a registry of
//!   sub-decoders (`decoders::*`) into `DecodedMessage` values
//! - `aggregate` folds the message stream into session counters, cell
//!   records, and measurement lists
//! - `sinks` fans the stream out to the configured outputs
//!
//! `pipeline::DiagSession` wires the stages together; the application
//! layer (diag-log-cli) owns byte sources, argument parsing, and file
//! handling.
//!
//! # Example Usage
//!
//! ```no_run
//! use diag_log_decoder::{DecoderConfig, DiagSession};
//! use diag_log_decoder::sinks::text::TextSink;
//! use std::fs::File;
//! use std::io::Read;
//!
//! let config = DecoderConfig::new().with_events(true);
//! let mut session = DiagSession::new(config, "dump.qmdl");
//! let out = File::create("report.txt").unwrap();
//! session.add_sink(Box::new(TextSink::new(out).unwrap()));
//!
//! let mut input = File::open("dump.qmdl").unwrap();
//! let mut chunk = [0u8; 4096];
//! loop {
//!     let n = input.read(&mut chunk).unwrap();
//!     if n == 0 {
//!         break;
//!     }
//!     session.feed(&chunk[..n]);
//! }
//! let report = session.finish();
//! println!("{} messages decoded", report.summary.total_messages);
//! ```

pub mod aggregate;
pub mod config;
pub mod crc;
pub mod decoders;
pub mod dispatch;
pub mod framing;
pub mod pipeline;
pub mod sinks;
pub mod types;

pub use aggregate::{Aggregator, SessionReport, SessionSummary};
pub use config::DecoderConfig;
pub use dispatch::Dispatcher;
pub use framing::FrameReassembler;
pub use pipeline::DiagSession;
pub use sinks::{MessageSink, SinkMux};
pub use types::{DecodedMessage, DiagError, MessageBody, RadioLayer, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
