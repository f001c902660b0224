//! Service-messaging (QMI) sub-decoder (log code 0x1544)
//!
//! Parses the fixed 15-byte link header and then walks the self-describing
//! TLV region: 1-byte type, 2-byte little-endian length, value. A TLV
//! declaring more bytes than remain fails only this message; the session
//! continues.

use super::DecodeOutput;
use crate::types::{
    DiagError, MessageBody, Result, ServiceDirection, ServicePacket, Tlv,
};
use byteorder::{ByteOrder, LittleEndian};

/// Static service-id name table; ids outside the table pass through
/// numerically.
const SERVICE_NAMES: &[(u8, &str)] = &[
    (1, "CTL"),
    (2, "WDS"),
    (3, "DMS"),
    (4, "NAS"),
    (5, "QOS"),
    (6, "WMS"),
    (7, "PDS"),
    (8, "AUTH"),
    (9, "AT"),
    (10, "VOICE"),
    (11, "CAT2"),
    (12, "UIM"),
    (13, "PBM"),
    (14, "QCHAT"),
    (15, "RMTFS"),
    (16, "TEST"),
    (17, "LOC"),
    (18, "SAR"),
    (19, "IMSS"),
    (20, "ADC"),
    (21, "MFS"),
];

/// Header length ahead of the TLV region
const HEADER_LEN: usize = 15;

pub fn service_name(id: u8) -> Option<&'static str> {
    SERVICE_NAMES
        .iter()
        .find(|(sid, _)| *sid == id)
        .map(|(_, name)| *name)
}

fn direction(code: u8) -> ServiceDirection {
    match code {
        0 => ServiceDirection::Request,
        2 => ServiceDirection::Response,
        4 => ServiceDirection::Indication,
        other => ServiceDirection::Other(other),
    }
}

/// Decode a service-messaging packet body
pub fn decode(body: &[u8]) -> Result<Vec<DecodeOutput>> {
    if body.len() < HEADER_LEN {
        return Err(DiagError::TruncatedPayload {
            expected: HEADER_LEN,
            actual: body.len(),
        });
    }

    let service_id = body[4];
    let packet = ServicePacket {
        version: body[0],
        direction: direction(body[1]),
        counter: LittleEndian::read_u16(&body[2..4]),
        service_id,
        service_name: service_name(service_id),
        major_rev: body[5],
        minor_rev: body[6],
        con_handle: LittleEndian::read_u32(&body[7..11]),
        msg_id: LittleEndian::read_u16(&body[11..13]),
        declared_len: LittleEndian::read_u16(&body[13..15]),
        tlvs: walk_tlvs(&body[HEADER_LEN..])?,
    };

    Ok(vec![DecodeOutput::from_envelope(MessageBody::ServicePacket(
        packet,
    ))])
}

/// Walk a TLV region to exhaustion. An overrunning TLV is an error;
/// the caller downgrades this message to Unknown.
pub fn walk_tlvs(region: &[u8]) -> Result<Vec<Tlv>> {
    let mut tlvs = Vec::new();
    let mut pos = 0usize;
    while pos + 3 <= region.len() {
        let tlv_type = region[pos];
        let length = LittleEndian::read_u16(&region[pos + 1..pos + 3]);
        pos += 3;
        let remaining = region.len() - pos;
        if length as usize > remaining {
            return Err(DiagError::TlvOverrun {
                declared: length as usize,
                remaining,
            });
        }
        tlvs.push(Tlv {
            tlv_type,
            length,
            value: region[pos..pos + length as usize].to_vec(),
        });
        pos += length as usize;
    }
    Ok(tlvs)
}
