//! Core types for the DIAG log decoder library
//!
//! This module defines all the fundamental types that flow out of the
//! decoding pipeline. Sub-decoders produce `DecodedMessage` values; sinks
//! and the aggregator only ever see this canonical model.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DiagError>;

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DiagError {
    #[error("Truncated payload: need {expected} bytes, have {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    #[error("TLV length {declared} overruns remaining {remaining} bytes")]
    TlvOverrun { declared: usize, remaining: usize },

    #[error("Unrecognized message version: {0}")]
    UnknownVersion(u8),

    #[error("Sink '{name}' failed: {reason}")]
    SinkError { name: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Unescaped byte sequence between two frame delimiters.
///
/// Produced by the reassembler; the 16-bit CRC trailer is still attached
/// and has not been verified yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fixed header fields of a validated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Primary command code (first byte of the frame)
    pub primary: u8,
    /// Log item code for log packets (primary 0x10)
    pub log_code: Option<u16>,
    /// Declared body length from the log header, if present
    pub declared_len: Option<u16>,
    /// Raw 64-bit device timestamp (1.25 ms ticks in the upper 48 bits)
    pub device_ticks: u64,
}

/// GPS epoch used by the device timestamp format (1980-01-06 00:00:00 UTC)
const GPS_EPOCH_SECS: i64 = 315_964_800;

/// Convert a raw device timestamp to wall-clock time.
///
/// The upper 48 bits count 1.25 ms ticks since the GPS epoch; the low
/// 16 bits are a sub-tick fraction we do not need.
pub fn device_ticks_to_utc(ticks: u64) -> Timestamp {
    let ms = (ticks >> 16) as i64 * 5 / 4;
    Utc.timestamp_millis_opt(GPS_EPOCH_SECS * 1000 + ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Format bytes as uppercase space-separated hex ("DE AD BE EF")
pub fn hex_spaced(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format bytes as contiguous uppercase hex ("DEADBEEF")
pub fn hex_packed(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Best-effort ASCII rendering of a payload; empty if not printable
pub fn ascii_if_printable(data: &[u8]) -> String {
    if !data.is_empty() && data.iter().all(|&b| (0x20..0x7F).contains(&b)) {
        data.iter().map(|&b| b as char).collect()
    } else {
        String::new()
    }
}

/// Main decoded message type - the primary output of the pipeline.
///
/// Immutable once constructed; the raw message bytes are always retained
/// so sinks can fall back to a hex dump regardless of variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    /// Wall-clock capture timestamp derived from the device timestamp
    pub timestamp: Timestamp,
    /// Raw device tick counter (monotonic per source)
    pub device_ticks: u64,
    /// Source/subscription identifier (0 on single-radio devices)
    pub radio_id: u8,
    /// Raw message body bytes after the envelope
    pub raw: Vec<u8>,
    /// Variant-specific structured fields
    pub body: MessageBody,
}

/// Tagged union over all decoded message variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageBody {
    Event(EventRecord),
    ServicePacket(ServicePacket),
    ApduExchange(ApduExchange),
    PhoneEvent(PhoneEvent),
    PolicyStats(PolicyStats),
    RadioLayer(RadioLayerMessage),
    Unknown(UnknownMessage),
}

impl MessageBody {
    /// Short label for logs and the text sink
    pub fn label(&self) -> &'static str {
        match self {
            MessageBody::Event(_) => "Event",
            MessageBody::ServicePacket(_) => "QMI Link",
            MessageBody::ApduExchange(_) => "RUIM Debug",
            MessageBody::PhoneEvent(_) => "CM Phone Event",
            MessageBody::PolicyStats(_) => "PM Policy Stats",
            MessageBody::RadioLayer(_) => "Radio",
            MessageBody::Unknown(_) => "Unknown",
        }
    }
}

/// A single generic event record (primary code 0x60)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub event_id: u16,
    pub event_name: String,
    pub payload: Vec<u8>,
    /// Decoded string payload, if a per-id decoder is registered;
    /// otherwise best-effort ASCII (possibly empty)
    pub payload_text: String,
}

/// Message direction for the service-messaging protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceDirection {
    Request,
    Response,
    Indication,
    /// Unrecognized direction code, passed through numerically
    Other(u8),
}

impl fmt::Display for ServiceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceDirection::Request => write!(f, "Request"),
            ServiceDirection::Response => write!(f, "Response"),
            ServiceDirection::Indication => write!(f, "Indication"),
            ServiceDirection::Other(v) => write!(f, "Other({})", v),
        }
    }
}

/// A single Type-Length-Value field from a service packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tlv {
    pub tlv_type: u8,
    pub length: u16,
    pub value: Vec<u8>,
}

/// Decoded service-messaging (QMI) packet with its TLV region walked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePacket {
    pub version: u8,
    pub direction: ServiceDirection,
    pub counter: u16,
    pub service_id: u8,
    /// Resolved service name, or None for ids outside the static table
    pub service_name: Option<&'static str>,
    pub major_rev: u8,
    pub minor_rev: u8,
    pub con_handle: u32,
    pub msg_id: u16,
    pub declared_len: u16,
    pub tlvs: Vec<Tlv>,
}

/// Smart-card exchange direction; Tx and Rx are independent messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ApduExchange {
    Command(ApduCommand),
    Response(ApduResponse),
}

/// Host-to-card command APDU
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub p3: u8,
    /// Resolved instruction name, or "UNKNOWN (0xXX)" raw hex
    pub instruction: String,
    /// Logical channel from the low bits of the class byte
    pub channel: u8,
    /// Secure messaging indicated by the class byte
    pub secure_messaging: bool,
    pub data: Vec<u8>,
}

/// Card-to-host response APDU
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApduResponse {
    pub sw1: u8,
    pub sw2: u8,
    /// Resolved status-word meaning
    pub status: String,
    pub data: Vec<u8>,
}

/// Phone-state event (call-manager subsystem)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneEvent {
    pub version: u8,
    pub event_id: u16,
    pub event_name: String,
    /// Present when the packet carries the common state fields
    pub in_use: Option<bool>,
    pub operating_mode: Option<String>,
}

/// Policy-manager statistics packet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyStats {
    pub version: u8,
    pub policy_num: u16,
    pub policy_type: u8,
    pub policy_version: u8,
    pub last_exec_time: u32,
    pub elapsed_time: u32,
    pub num_rules: u16,
    pub suspend_count: u16,
    pub is_policy_init: bool,
}

/// Protocol layer tag for radio-layer messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioLayer {
    Rrc,
    Nas,
    Mac,
    Ml1,
    Other,
}

impl fmt::Display for RadioLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioLayer::Rrc => write!(f, "RRC"),
            RadioLayer::Nas => write!(f, "NAS"),
            RadioLayer::Mac => write!(f, "MAC"),
            RadioLayer::Ml1 => write!(f, "ML1"),
            RadioLayer::Other => write!(f, "OTHER"),
        }
    }
}

/// Air-interface message; fully decoded for supported log codes,
/// minimal envelope otherwise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadioLayerMessage {
    pub log_code: u16,
    pub layer: RadioLayer,
    pub payload: Vec<u8>,
    pub info: RadioInfo,
}

/// Structured radio-layer content, where supported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RadioInfo {
    CellInfo(CellInfo),
    Measurement(Measurement),
    /// Semantic decode deferred to an external analyzer via the capture sink
    Envelope,
}

/// Serving-cell system information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellInfo {
    pub version: u8,
    pub pci: u16,
    pub earfcn_dl: u32,
    pub earfcn_ul: u32,
    pub bandwidth_dl: u8,
    pub bandwidth_ul: u8,
    pub cell_identity: u32,
    pub tac: u16,
    pub band: u32,
    pub mcc: u16,
    pub mnc: u16,
}

/// Serving-cell measurement report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub version: u8,
    pub earfcn: u32,
    pub pci: u16,
    pub sfn: u16,
    pub subfn: u8,
    pub rsrp_dbm: f64,
    pub rsrq_db: f64,
}

/// Anything the registry has no decoder for, or a recognized message
/// whose internal version is unsupported. Never dropped silently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownMessage {
    pub primary: u8,
    pub log_code: Option<u16>,
    /// Vendor name for log codes we recognize but do not decode
    pub name: Option<&'static str>,
    /// Diagnostic carried from a failed sub-decode, if any
    pub reason: Option<String>,
}

impl DecodedMessage {
    /// True when this message should produce a capture record
    pub fn is_radio_layer(&self) -> bool {
        matches!(self.body, MessageBody::RadioLayer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ticks_epoch() {
        // Zero ticks is exactly the GPS epoch
        let ts = device_ticks_to_utc(0);
        assert_eq!(ts.timestamp(), GPS_EPOCH_SECS);
    }

    #[test]
    fn test_device_ticks_scaling() {
        // 800 ticks of 1.25 ms = 1 second
        let ts = device_ticks_to_utc(800u64 << 16);
        assert_eq!(ts.timestamp(), GPS_EPOCH_SECS + 1);
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_spaced(&[0xDE, 0xAD]), "DE AD");
        assert_eq!(hex_packed(&[0xDE, 0xAD]), "DEAD");
        assert_eq!(ascii_if_printable(b"modem"), "modem");
        assert_eq!(ascii_if_printable(&[0x00, 0x41]), "");
        assert_eq!(ascii_if_printable(&[]), "");
    }

    #[test]
    fn test_service_direction_display() {
        assert_eq!(format!("{}", ServiceDirection::Request), "Request");
        assert_eq!(format!("{}", ServiceDirection::Other(9)), "Other(9)");
    }
}
