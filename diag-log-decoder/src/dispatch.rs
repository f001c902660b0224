//! Message dispatch: validated frame bytes to decoded messages
//!
//! The dispatcher parses the frame envelope, looks the message up in its
//! registry of sub-decoders, and turns each decoded record into a
//! `DecodedMessage` with a resolved wall-clock timestamp. Messages the
//! registry cannot place, and messages whose sub-decoder fails, are
//! emitted as Unknown rather than dropped.

use crate::config::DecoderConfig;
use crate::decoders::{self, DecodeFn, DecodeOutput};
use crate::types::{
    device_ticks_to_utc, DecodedMessage, Envelope, MessageBody, UnknownMessage,
};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

/// Primary command code for log packets
pub const CMD_LOG: u8 = 0x10;
/// Primary command code for event reports
pub const CMD_EVENT_REPORT: u8 = 0x60;
/// Primary command code for the multi-radio wrapper
pub const CMD_MULTI_RADIO: u8 = 0x98;

/// Inclusive log-code window handled by the radio-layer sub-decoder
const RADIO_WINDOW: std::ops::RangeInclusive<u16> = 0xB000..=0xCFFF;

/// Log header: cmd(1) pad(3) len(2) code(2) timestamp(8)
const LOG_HEADER_LEN: usize = 16;
/// Wrapper header: cmd(1) version(4) radio_id(4)
const WRAPPER_HEADER_LEN: usize = 9;

/// Vendor names for log codes we recognize but do not decode. Unknown
/// messages carry the name so reports stay readable without a decoder.
const LOG_CODE_NAMES: &[(u16, &str)] = &[
    (0x1375, "Power Management Report"),
    (0x1384, "CGPS PDSM External Status NMEA Report"),
    (0x13D1, "XO Frequency Estimation"),
    (0x1476, "GNSS Position Report"),
    (0x1841, "RF ASDIV"),
    (0x1849, "RF Device Status"),
    (0x18F7, "RF Calibration Data"),
    (0x1998, "PM PH History Info"),
    (0x19ED, "Atuner Detune Info"),
    (0x4134, "RF WCDMA TX Report"),
    (0x4178, "RF Power Report"),
    (0x4179, "RF LTE TX Report"),
    (0x4186, "RF GSM TX Report"),
    (0x418B, "WCDMA Flexible DL RLC AM PDU"),
    (0x41D4, "RF LTE RX Report"),
    (0x421E, "WCDMA MAC-ehs Reassembly"),
    (0x4222, "WCDMA Advanced Report"),
    (0x7130, "UMTS NAS_GMM State"),
    (0x7131, "UMTS NAS_MM State"),
    (0x7132, "UMTS NAS_REG State"),
    (0x7152, "UMTS NAS_FPLMN List"),
];

pub fn log_code_name(code: u16) -> Option<&'static str> {
    LOG_CODE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Registry-driven frame decoder
pub struct Dispatcher {
    registry: HashMap<(u8, Option<u16>), DecodeFn>,
    config: DecoderConfig,
    /// Last device tick count seen per radio id, for regression warnings
    last_ticks: HashMap<u8, u64>,
}

impl Dispatcher {
    pub fn new(config: DecoderConfig) -> Self {
        let mut registry: HashMap<(u8, Option<u16>), DecodeFn> = HashMap::new();

        if config.decode_events {
            registry.insert((CMD_EVENT_REPORT, None), decoders::event::decode);
        }
        if config.decode_extended {
            registry.insert((CMD_LOG, Some(0x1098)), decoders::apdu::decode);
            registry.insert((CMD_LOG, Some(0x1273)), decoders::phone_event::decode);
            registry.insert((CMD_LOG, Some(0x1544)), decoders::qmi::decode);
            registry.insert((CMD_LOG, Some(0x199B)), decoders::policy::decode);
        }

        Self {
            registry,
            config,
            last_ticks: HashMap::new(),
        }
    }

    /// Register an additional sub-decoder. Exact-match keys only; the
    /// radio window is handled internally by range.
    pub fn register(&mut self, primary: u8, log_code: Option<u16>, decoder: DecodeFn) {
        self.registry.insert((primary, log_code), decoder);
    }

    /// Decode one CRC-validated frame into zero or more messages
    pub fn dispatch(&mut self, payload: &[u8]) -> Vec<DecodedMessage> {
        self.dispatch_inner(payload, 0)
    }

    fn dispatch_inner(&mut self, payload: &[u8], radio_id: u8) -> Vec<DecodedMessage> {
        if payload.is_empty() {
            return Vec::new();
        }

        match payload[0] {
            CMD_MULTI_RADIO => self.dispatch_wrapped(payload),
            CMD_LOG => self.dispatch_log(payload, radio_id),
            primary => {
                // Non-log frames carry no header beyond the command byte
                let envelope = Envelope {
                    primary,
                    log_code: None,
                    declared_len: None,
                    device_ticks: 0,
                };
                let outputs = match self.registry.get(&(primary, None)) {
                    Some(decoder) => match decoder(payload) {
                        Ok(outputs) => outputs,
                        Err(e) => {
                            log::warn!("Decode failed for primary 0x{:02X}: {}", primary, e);
                            vec![failed(&envelope, e.to_string())]
                        }
                    },
                    None => vec![unhandled(&envelope)],
                };
                self.finalize(outputs, &envelope, radio_id, payload)
            }
        }
    }

    /// Unwrap a multi-radio frame and dispatch its inner message under
    /// the wrapper's radio id
    fn dispatch_wrapped(&mut self, payload: &[u8]) -> Vec<DecodedMessage> {
        if payload.len() < WRAPPER_HEADER_LEN {
            log::warn!(
                "Multi-radio wrapper truncated at {} bytes, skipping",
                payload.len()
            );
            return Vec::new();
        }
        let radio_id_field = LittleEndian::read_u32(&payload[5..9]);
        let radio_id = (radio_id_field & 0xFF) as u8;
        self.dispatch_inner(&payload[WRAPPER_HEADER_LEN..], radio_id)
    }

    fn dispatch_log(&mut self, payload: &[u8], radio_id: u8) -> Vec<DecodedMessage> {
        if payload.len() < LOG_HEADER_LEN {
            log::warn!("Log packet truncated at {} bytes, skipping", payload.len());
            return Vec::new();
        }
        let log_code = LittleEndian::read_u16(&payload[6..8]);
        let envelope = Envelope {
            primary: CMD_LOG,
            log_code: Some(log_code),
            declared_len: Some(LittleEndian::read_u16(&payload[4..6])),
            device_ticks: LittleEndian::read_u64(&payload[8..16]),
        };
        let body = &payload[LOG_HEADER_LEN..];
        // Declared length covers everything after the pad bytes
        if let Some(declared) = envelope.declared_len {
            if declared as usize != body.len() + 12 {
                log::trace!(
                    "Log 0x{:04X} declares {} bytes, envelope carries {}",
                    log_code,
                    declared,
                    body.len() + 12
                );
            }
        }

        let outputs = if RADIO_WINDOW.contains(&log_code) {
            let layer = decoders::radio::layer_for_code(log_code);
            if !self.config.should_emit_layer(layer) {
                return Vec::new();
            }
            match decoders::radio::decode(log_code, body) {
                Ok(outputs) => outputs,
                Err(e) => {
                    log::warn!("Radio decode failed for 0x{:04X}: {}", log_code, e);
                    vec![failed(&envelope, e.to_string())]
                }
            }
        } else {
            match self.registry.get(&(CMD_LOG, Some(log_code))) {
                Some(decoder) => match decoder(body) {
                    Ok(outputs) => outputs,
                    Err(e) => {
                        log::warn!("Decode failed for log code 0x{:04X}: {}", log_code, e);
                        vec![failed(&envelope, e.to_string())]
                    }
                },
                None => {
                    log::debug!("No decoder for log code 0x{:04X}", log_code);
                    vec![unhandled(&envelope)]
                }
            }
        };

        self.finalize(outputs, &envelope, radio_id, body)
    }

    /// Resolve timestamps and fill the message shell for every record
    fn finalize(
        &mut self,
        outputs: Vec<DecodeOutput>,
        envelope: &Envelope,
        radio_id: u8,
        raw: &[u8],
    ) -> Vec<DecodedMessage> {
        outputs
            .into_iter()
            .map(|out| {
                let ticks = out.device_ticks.unwrap_or(envelope.device_ticks);
                self.note_ticks(radio_id, envelope.primary, ticks);
                DecodedMessage {
                    timestamp: device_ticks_to_utc(ticks),
                    device_ticks: ticks,
                    radio_id,
                    raw: raw.to_vec(),
                    body: out.body,
                }
            })
            .collect()
    }

    /// Warn once per regression when a source's clock runs backwards
    fn note_ticks(&mut self, radio_id: u8, primary: u8, ticks: u64) {
        let last = self.last_ticks.entry(radio_id).or_insert(0);
        if ticks < *last {
            log::warn!(
                "Device timestamp regression on radio {} (primary 0x{:02X}): {} < {}",
                radio_id,
                primary,
                ticks,
                *last
            );
        }
        *last = (*last).max(ticks);
    }
}

fn unhandled(envelope: &Envelope) -> DecodeOutput {
    DecodeOutput::from_envelope(MessageBody::Unknown(UnknownMessage {
        primary: envelope.primary,
        log_code: envelope.log_code,
        name: envelope.log_code.and_then(log_code_name),
        reason: None,
    }))
}

fn failed(envelope: &Envelope, reason: String) -> DecodeOutput {
    DecodeOutput::from_envelope(MessageBody::Unknown(UnknownMessage {
        primary: envelope.primary,
        log_code: envelope.log_code,
        name: envelope.log_code.and_then(log_code_name),
        reason: Some(reason),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApduExchange, MessageBody};

    /// Wrap a log body in the 16-byte log header
    pub(crate) fn log_packet(log_code: u16, ticks: u64, body: &[u8]) -> Vec<u8> {
        let mut out = vec![CMD_LOG, 0, 0, 0];
        out.extend_from_slice(&(body.len() as u16 + 12).to_le_bytes());
        out.extend_from_slice(&log_code.to_le_bytes());
        out.extend_from_slice(&ticks.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn wrap_multi_radio(radio_id: u32, inner: &[u8]) -> Vec<u8> {
        let mut out = vec![CMD_MULTI_RADIO];
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&radio_id.to_le_bytes());
        out.extend_from_slice(inner);
        out
    }

    #[test]
    fn test_log_packet_routed_by_code() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        // APDU response with SW 90 00
        let packet = log_packet(0x1098, 5u64 << 16, &[0x01, 0x90, 0x00]);
        let messages = d.dispatch(&packet);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0].body,
            MessageBody::ApduExchange(ApduExchange::Response(_))
        ));
        assert_eq!(messages[0].device_ticks, 5u64 << 16);
        assert_eq!(messages[0].radio_id, 0);
    }

    #[test]
    fn test_unknown_log_code_preserved() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        let messages = d.dispatch(&log_packet(0x7777, 0, &[0xAA]));
        assert_eq!(messages.len(), 1);
        match &messages[0].body {
            MessageBody::Unknown(u) => {
                assert_eq!(u.primary, CMD_LOG);
                assert_eq!(u.log_code, Some(0x7777));
                assert_eq!(u.name, None);
                assert_eq!(u.reason, None);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_undecoded_but_named_log_code() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        let messages = d.dispatch(&log_packet(0x418B, 0, &[0xAA]));
        match &messages[0].body {
            MessageBody::Unknown(u) => {
                assert_eq!(u.name, Some("WCDMA Flexible DL RLC AM PDU"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
        assert_eq!(log_code_name(0x7131), Some("UMTS NAS_MM State"));
        assert_eq!(log_code_name(0x7777), None);
    }

    #[test]
    fn test_decreasing_ticks_never_reorder() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        // The device clock runs backwards; arrival order must hold
        let ticks = [300u64 << 16, 100 << 16, 200 << 16];
        let mut seen = Vec::new();
        for t in ticks {
            let messages = d.dispatch(&log_packet(0x1098, t, &[0x01, 0x90, 0x00]));
            assert_eq!(messages.len(), 1);
            seen.push(messages[0].device_ticks);
        }
        assert_eq!(seen, ticks);
    }

    #[test]
    fn test_decoder_failure_downgrades_to_unknown() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        // Policy stats packet too short for its fixed layout
        let messages = d.dispatch(&log_packet(0x199B, 0, &[0x01, 0x02]));
        assert_eq!(messages.len(), 1);
        match &messages[0].body {
            MessageBody::Unknown(u) => {
                assert_eq!(u.log_code, Some(0x199B));
                assert!(u.reason.is_some());
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_multi_radio_wrapper_sets_radio_id() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        let inner = log_packet(0x1098, 0, &[0x01, 0x90, 0x00]);
        let messages = d.dispatch(&wrap_multi_radio(1, &inner));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].radio_id, 1);
    }

    #[test]
    fn test_radio_window_routed_by_range() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        let messages = d.dispatch(&log_packet(0xB0E2, 0, &[0x01]));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_radio_layer());
    }

    #[test]
    fn test_layer_filter_drops_messages() {
        let config = DecoderConfig::default()
            .with_layer_filter(vec![crate::types::RadioLayer::Rrc]);
        let mut d = Dispatcher::new(config);
        // NAS-window message filtered out entirely
        assert!(d.dispatch(&log_packet(0xB0E2, 0, &[0x01])).is_empty());
        // RRC-window message passes
        assert_eq!(d.dispatch(&log_packet(0xB0C5, 0, &[0x01])).len(), 1);
    }

    #[test]
    fn test_events_disabled_yields_unknown() {
        let mut d = Dispatcher::new(DecoderConfig::default().with_events(false));
        let messages = d.dispatch(&[CMD_EVENT_REPORT, 0x00, 0x00]);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0].body, MessageBody::Unknown(_)));
    }

    #[test]
    fn test_event_records_get_own_timestamps() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        // One event record with a full 8-byte timestamp, no payload
        let id_field: u16 = 1606;
        let mut body = id_field.to_le_bytes().to_vec();
        body.extend_from_slice(&(42u64 << 16).to_le_bytes());
        let mut frame = vec![CMD_EVENT_REPORT];
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.extend_from_slice(&body);

        let messages = d.dispatch(&frame);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].device_ticks, 42u64 << 16);
    }

    #[test]
    fn test_truncated_log_header_skipped() {
        let mut d = Dispatcher::new(DecoderConfig::default());
        assert!(d.dispatch(&[CMD_LOG, 0, 0, 0]).is_empty());
        assert!(d.dispatch(&[]).is_empty());
    }

    #[test]
    fn test_custom_registration() {
        fn stub(_body: &[u8]) -> crate::types::Result<Vec<DecodeOutput>> {
            Ok(vec![DecodeOutput::from_envelope(MessageBody::Unknown(
                UnknownMessage {
                    primary: 0x10,
                    log_code: Some(0x5555),
                    name: None,
                    reason: Some("stub".to_string()),
                },
            ))])
        }
        let mut d = Dispatcher::new(DecoderConfig::default());
        d.register(CMD_LOG, Some(0x5555), stub);
        let messages = d.dispatch(&log_packet(0x5555, 0, &[]));
        match &messages[0].body {
            MessageBody::Unknown(u) => assert_eq!(u.reason.as_deref(), Some("stub")),
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
