//! Generic event report sub-decoder (primary code 0x60)
//!
//! An event report frame packs one or more event records. Each record
//! starts with a 16-bit id field: the low 12 bits are the event id, bits
//! 13-14 select the payload shape, and bit 15 selects a truncated 2-byte
//! timestamp instead of the full 8-byte one. Events without a registered
//! payload decoder still carry their raw payload as hex plus best-effort
//! text; nothing is dropped for lack of a specific decoder.

use super::DecodeOutput;
use crate::types::{
    ascii_if_printable, DiagError, EventRecord, MessageBody, Result,
};
use byteorder::{ByteOrder, LittleEndian};

/// Static event-id name table.
///
/// Ids follow the vendor's published event_defs list; unlisted ids render
/// as `UNKNOWN_EVENT_<id>`.
const EVENT_NAMES: &[(u16, &str)] = &[
    (1200, "GSM_RACH_ATTEMPT"),
    (1201, "GSM_RACH_SUCCESS"),
    (1202, "GSM_RACH_FAILURE"),
    (1210, "GSM_CELL_SELECTION"),
    (1211, "GSM_CELL_RESELECTION"),
    (1605, "LTE_RRC_TIMER_STATUS"),
    (1606, "LTE_RRC_STATE_CHANGE"),
    (1609, "LTE_RRC_DL_MSG"),
    (1610, "LTE_RRC_UL_MSG"),
    (1614, "LTE_RRC_PAGING_DRX_CYCLE"),
    (1682, "IPV6_SM_EVENT"),
    (1684, "IPV6_PREFIX_UPDATE"),
    (2100, "WCDMA_RRC_STATE_CHANGE"),
    (2101, "WCDMA_RRC_DL_MSG"),
    (2102, "WCDMA_RRC_UL_MSG"),
    (2103, "WCDMA_RRC_PAGING_DRX_CYCLE"),
    (2865, "EVENT_DIAG_QSHRINK_ID"),
    (2866, "EVENT_DIAG_PROCESS_NAME_ID"),
    (3000, "NR_RRC_STATE_CHANGE"),
    (3001, "NR_RRC_DL_MSG"),
    (3002, "NR_RRC_UL_MSG"),
    (3010, "NR_RRC_PAGING_DRX_CYCLE"),
];

/// Event id for the process-name report; payload is a 1-byte id followed
/// by a UTF-8 process name
const EVENT_PROCESS_NAME: u16 = 2866;
/// Event id for the shrink-id report; payload is a 1-byte id plus a
/// 16-byte GUID
const EVENT_QSHRINK_ID: u16 = 2865;

pub fn event_name(id: u16) -> String {
    EVENT_NAMES
        .iter()
        .find(|(eid, _)| *eid == id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("UNKNOWN_EVENT_{}", id))
}

/// Decode an event report frame into one message per contained record
pub fn decode(payload: &[u8]) -> Result<Vec<DecodeOutput>> {
    // cmd(1) + declared record-region length(2)
    if payload.len() < 3 {
        return Err(DiagError::TruncatedPayload {
            expected: 3,
            actual: payload.len(),
        });
    }
    let declared = LittleEndian::read_u16(&payload[1..3]) as usize;
    let region = &payload[3..];
    let region = &region[..declared.min(region.len())];

    let mut outputs = Vec::new();
    let mut pos = 0usize;
    let mut last_full_ticks: u64 = 0;

    while pos + 2 <= region.len() {
        let id_field = LittleEndian::read_u16(&region[pos..pos + 2]);
        pos += 2;

        let event_id = id_field & 0x0FFF;
        let payload_kind = (id_field >> 13) & 0x3;
        let truncated_ts = id_field & 0x8000 != 0;

        let ticks = if truncated_ts {
            if pos + 2 > region.len() {
                break;
            }
            pos += 2;
            // Truncated stamps refine the last full one; the coarse value
            // is close enough for ordering
            last_full_ticks
        } else {
            if pos + 8 > region.len() {
                break;
            }
            let t = LittleEndian::read_u64(&region[pos..pos + 8]);
            pos += 8;
            last_full_ticks = t;
            t
        };

        let payload_len = match payload_kind {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => {
                if pos >= region.len() {
                    break;
                }
                let n = region[pos] as usize;
                pos += 1;
                n
            }
        };
        if pos + payload_len > region.len() {
            log::warn!(
                "Event {} payload of {} bytes overruns record region, stopping walk",
                event_id,
                payload_len
            );
            break;
        }
        let body = region[pos..pos + payload_len].to_vec();
        pos += payload_len;

        outputs.push(DecodeOutput::with_ticks(
            ticks,
            MessageBody::Event(build_record(event_id, body)),
        ));
    }

    Ok(outputs)
}

fn build_record(event_id: u16, payload: Vec<u8>) -> EventRecord {
    let payload_text = match event_id {
        EVENT_PROCESS_NAME => decode_process_name(&payload),
        EVENT_QSHRINK_ID => decode_qshrink_id(&payload),
        _ => ascii_if_printable(&payload),
    };
    EventRecord {
        event_id,
        event_name: event_name(event_id),
        payload,
        payload_text,
    }
}

/// Payload decoder for EVENT_DIAG_PROCESS_NAME_ID: 1-byte id, then the
/// process name
fn decode_process_name(payload: &[u8]) -> String {
    if payload.len() < 2 {
        return String::new();
    }
    String::from_utf8_lossy(&payload[1..]).into_owned()
}

/// Payload decoder for EVENT_DIAG_QSHRINK_ID: 1-byte id, then a 16-byte
/// GUID rendered in its five big-endian blocks
fn decode_qshrink_id(payload: &[u8]) -> String {
    if payload.len() != 17 {
        return String::new();
    }
    let id = payload[0];
    let g = &payload[1..];
    let blocks = [
        u32::from_be_bytes([g[0], g[1], g[2], g[3]]) as u64,
        u16::from_be_bytes([g[4], g[5]]) as u64,
        u16::from_be_bytes([g[6], g[7]]) as u64,
        u16::from_be_bytes([g[8], g[9]]) as u64,
        g[10..16].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
    ];
    let guid = blocks
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join("-");
    format!("Diag Id = {}, GUID = {}", id, guid)
}
