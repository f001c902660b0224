//! Per-protocol sub-decoders
//!
//! Each sub-decoder is a pure function from body bytes to one or more
//! decoded message bodies. The dispatcher owns the mapping from
//! (primary code, log code) to these functions; adding coverage means
//! adding a registry entry, never touching the dispatch loop.

pub mod apdu;
pub mod event;
pub mod phone_event;
pub mod policy;
pub mod qmi;
pub mod radio;

use crate::types::{MessageBody, Result};

/// One decoded record plus its own device timestamp, when the record
/// carries one (event reports do; log packets use the envelope's).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutput {
    pub device_ticks: Option<u64>,
    pub body: MessageBody,
}

impl DecodeOutput {
    /// Record timestamped by the enclosing envelope
    pub fn from_envelope(body: MessageBody) -> Self {
        Self {
            device_ticks: None,
            body,
        }
    }

    /// Record carrying its own device timestamp
    pub fn with_ticks(device_ticks: u64, body: MessageBody) -> Self {
        Self {
            device_ticks: Some(device_ticks),
            body,
        }
    }
}

/// Signature shared by every registered sub-decoder
pub type DecodeFn = fn(&[u8]) -> Result<Vec<DecodeOutput>>;
