//! Radio-layer sub-decoder (log codes 0xB000-0xCFFF)
//!
//! Two codes get a full structured decode: serving-cell info (0xB0C0)
//! and serving-cell measurement (0xB193). Every other code in the window
//! is tagged with its protocol layer and passed through with its raw
//! payload; semantic decode is deferred to an external analyzer fed by
//! the capture sink.

use super::DecodeOutput;
use crate::types::{
    CellInfo, DiagError, Measurement, MessageBody, RadioInfo, RadioLayer,
    RadioLayerMessage, Result,
};
use byteorder::{ByteOrder, LittleEndian};

/// Log code for serving-cell system information
pub const LOG_CELL_INFO: u16 = 0xB0C0;
/// Log code for serving-cell measurement reports
pub const LOG_MEASUREMENT: u16 = 0xB193;

/// Map a log code inside the radio window to its protocol layer
pub fn layer_for_code(log_code: u16) -> RadioLayer {
    match log_code {
        0xB060..=0xB08F => RadioLayer::Mac,
        0xB0C0..=0xB0CF => RadioLayer::Rrc,
        0xB0E0..=0xB0FF => RadioLayer::Nas,
        0xB100..=0xB1FF => RadioLayer::Ml1,
        _ => RadioLayer::Other,
    }
}

/// Decode any log code in the radio window
pub fn decode(log_code: u16, body: &[u8]) -> Result<Vec<DecodeOutput>> {
    let info = match log_code {
        LOG_CELL_INFO => RadioInfo::CellInfo(decode_cell_info(body)?),
        LOG_MEASUREMENT => RadioInfo::Measurement(decode_measurement(body)?),
        _ => RadioInfo::Envelope,
    };

    Ok(vec![DecodeOutput::from_envelope(MessageBody::RadioLayer(
        RadioLayerMessage {
            log_code,
            layer: layer_for_code(log_code),
            payload: body.to_vec(),
            info,
        },
    ))])
}

/// Serving-cell info: channel numbers widened from 16 to 32 bits at
/// layout version 5, everything after them shifted accordingly
fn decode_cell_info(body: &[u8]) -> Result<CellInfo> {
    if body.is_empty() {
        return Err(DiagError::TruncatedPayload {
            expected: 1,
            actual: 0,
        });
    }
    let version = body[0];
    match version {
        v if v < 5 => {
            if body.len() < 23 {
                return Err(DiagError::TruncatedPayload {
                    expected: 23,
                    actual: body.len(),
                });
            }
            Ok(CellInfo {
                version,
                pci: LittleEndian::read_u16(&body[1..3]),
                earfcn_dl: LittleEndian::read_u16(&body[3..5]) as u32,
                earfcn_ul: LittleEndian::read_u16(&body[5..7]) as u32,
                bandwidth_dl: body[7],
                bandwidth_ul: body[8],
                cell_identity: LittleEndian::read_u32(&body[9..13]),
                tac: LittleEndian::read_u16(&body[13..15]),
                band: LittleEndian::read_u32(&body[15..19]),
                mcc: LittleEndian::read_u16(&body[19..21]),
                mnc: LittleEndian::read_u16(&body[21..23]),
            })
        }
        5..=20 => {
            if body.len() < 27 {
                return Err(DiagError::TruncatedPayload {
                    expected: 27,
                    actual: body.len(),
                });
            }
            Ok(CellInfo {
                version,
                pci: LittleEndian::read_u16(&body[1..3]),
                earfcn_dl: LittleEndian::read_u32(&body[3..7]),
                earfcn_ul: LittleEndian::read_u32(&body[7..11]),
                bandwidth_dl: body[11],
                bandwidth_ul: body[12],
                cell_identity: LittleEndian::read_u32(&body[13..17]),
                tac: LittleEndian::read_u16(&body[17..19]),
                band: LittleEndian::read_u32(&body[19..23]),
                mcc: LittleEndian::read_u16(&body[23..25]),
                mnc: LittleEndian::read_u16(&body[25..27]),
            })
        }
        other => Err(DiagError::UnknownVersion(other)),
    }
}

/// Measurement report: signal levels arrive in 1/16 units with fixed
/// offsets (rsrp − 180 dBm, rsrq − 30 dB)
fn decode_measurement(body: &[u8]) -> Result<Measurement> {
    if body.len() < 16 {
        return Err(DiagError::TruncatedPayload {
            expected: 16,
            actual: body.len(),
        });
    }
    let frame_field = LittleEndian::read_u16(&body[10..12]);
    Ok(Measurement {
        version: body[0],
        earfcn: LittleEndian::read_u32(&body[4..8]),
        pci: LittleEndian::read_u16(&body[8..10]) & 0x1FF,
        sfn: frame_field >> 4,
        subfn: (frame_field & 0xF) as u8,
        rsrp_dbm: LittleEndian::read_u16(&body[12..14]) as f64 / 16.0 - 180.0,
        rsrq_db: LittleEndian::read_u16(&body[14..16]) as f64 / 16.0 - 30.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_info_v2() -> Vec<u8> {
        let mut body = vec![0u8; 23];
        body[0] = 2; // version
        body[1..3].copy_from_slice(&42u16.to_le_bytes()); // pci
        body[3..5].copy_from_slice(&1850u16.to_le_bytes()); // earfcn dl
        body[5..7].copy_from_slice(&19850u16.to_le_bytes()); // earfcn ul
        body[7] = 100; // bw dl
        body[8] = 100; // bw ul
        body[9..13].copy_from_slice(&0x00AB_CDEFu32.to_le_bytes());
        body[13..15].copy_from_slice(&12345u16.to_le_bytes()); // tac
        body[15..19].copy_from_slice(&3u32.to_le_bytes()); // band
        body[19..21].copy_from_slice(&262u16.to_le_bytes()); // mcc
        body[21..23].copy_from_slice(&2u16.to_le_bytes()); // mnc
        body
    }

    #[test]
    fn test_cell_info_narrow_layout() {
        let outputs = decode(LOG_CELL_INFO, &cell_info_v2()).unwrap();
        match &outputs[0].body {
            MessageBody::RadioLayer(msg) => {
                assert_eq!(msg.layer, RadioLayer::Rrc);
                match &msg.info {
                    RadioInfo::CellInfo(info) => {
                        assert_eq!(info.pci, 42);
                        assert_eq!(info.earfcn_dl, 1850);
                        assert_eq!(info.tac, 12345);
                        assert_eq!((info.mcc, info.mnc), (262, 2));
                    }
                    other => panic!("unexpected info: {:?}", other),
                }
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_cell_info_wide_layout() {
        let mut body = vec![0u8; 27];
        body[0] = 5;
        body[1..3].copy_from_slice(&101u16.to_le_bytes());
        body[3..7].copy_from_slice(&66536u32.to_le_bytes()); // above u16 range
        body[7..11].copy_from_slice(&84536u32.to_le_bytes());
        body[17..19].copy_from_slice(&7u16.to_le_bytes());
        let outputs = decode(LOG_CELL_INFO, &body).unwrap();
        match &outputs[0].body {
            MessageBody::RadioLayer(msg) => match &msg.info {
                RadioInfo::CellInfo(info) => {
                    assert_eq!(info.earfcn_dl, 66536);
                    assert_eq!(info.earfcn_ul, 84536);
                    assert_eq!(info.tac, 7);
                }
                other => panic!("unexpected info: {:?}", other),
            },
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_cell_info_unknown_version() {
        let mut body = vec![0u8; 40];
        body[0] = 99;
        assert!(matches!(
            decode(LOG_CELL_INFO, &body),
            Err(DiagError::UnknownVersion(99))
        ));
    }

    #[test]
    fn test_measurement_scaling() {
        let mut body = vec![0u8; 16];
        body[0] = 1;
        body[4..8].copy_from_slice(&1850u32.to_le_bytes());
        body[8..10].copy_from_slice(&(42u16 | 0x0600).to_le_bytes()); // pci masked
        body[10..12].copy_from_slice(&((512u16 << 4) | 7).to_le_bytes());
        // (80 * 16) / 16 - 180 = -100 dBm
        body[12..14].copy_from_slice(&(80u16 * 16).to_le_bytes());
        // (20 * 16) / 16 - 30 = -10 dB
        body[14..16].copy_from_slice(&(20u16 * 16).to_le_bytes());

        let outputs = decode(LOG_MEASUREMENT, &body).unwrap();
        match &outputs[0].body {
            MessageBody::RadioLayer(msg) => {
                assert_eq!(msg.layer, RadioLayer::Ml1);
                match &msg.info {
                    RadioInfo::Measurement(m) => {
                        assert_eq!(m.pci, 42);
                        assert_eq!(m.sfn, 512);
                        assert_eq!(m.subfn, 7);
                        assert!((m.rsrp_dbm - -100.0).abs() < 1e-9);
                        assert!((m.rsrq_db - -10.0).abs() < 1e-9);
                    }
                    other => panic!("unexpected info: {:?}", other),
                }
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_unhandled_code_tagged_with_layer() {
        let outputs = decode(0xB0E2, &[0x01, 0x02]).unwrap();
        match &outputs[0].body {
            MessageBody::RadioLayer(msg) => {
                assert_eq!(msg.layer, RadioLayer::Nas);
                assert_eq!(msg.info, RadioInfo::Envelope);
                assert_eq!(msg.payload, vec![0x01, 0x02]);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_layer_windows() {
        assert_eq!(layer_for_code(0xB062), RadioLayer::Mac);
        assert_eq!(layer_for_code(0xB0C1), RadioLayer::Rrc);
        assert_eq!(layer_for_code(0xB193), RadioLayer::Ml1);
        assert_eq!(layer_for_code(0xC050), RadioLayer::Other);
    }

    #[test]
    fn test_truncated_rejected() {
        assert!(decode(LOG_CELL_INFO, &[]).is_err());
        assert!(decode(LOG_MEASUREMENT, &[0u8; 8]).is_err());
    }
}
