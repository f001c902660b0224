//! Frame trailer validation (CRC-16/X.25)
//!
//! Every unescaped frame carries a 16-bit CRC over its payload as the last
//! two bytes, little-endian. The polynomial is the protocol's pinned
//! constant: reflected CCITT 0x1021 (0x8408), init 0xFFFF, final XOR 0xFFFF.

/// Reflected CCITT polynomial
const POLY: u16 = 0x8408;

/// Compute the frame CRC over `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// Validate a frame's trailing CRC and strip it.
///
/// Returns the payload without the 2-byte trailer, or None on a mismatch
/// or a frame too short to carry one. Mismatches are recoverable; the
/// caller logs and moves on.
pub fn validate(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 3 {
        log::warn!("Dropping short frame ({} bytes)", frame.len());
        return None;
    }
    let (payload, trailer) = frame.split_at(frame.len() - 2);
    let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16(payload);
    if computed != expected {
        log::warn!(
            "CRC mismatch: computed 0x{:04X}, trailer 0x{:04X} ({} byte frame)",
            computed,
            expected,
            frame.len()
        );
        return None;
    }
    Some(payload)
}

/// Append a valid CRC trailer to a payload (used by tests and live-mode
/// command encoding)
pub fn append_crc(payload: &[u8]) -> Vec<u8> {
    let mut out = payload.to_vec();
    out.extend_from_slice(&crc16(payload).to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_known_value() {
        // CRC-16/X.25 check value for "123456789"
        assert_eq!(crc16(b"123456789"), 0x906E);
    }

    #[test]
    fn test_round_trip_validates() {
        let payload = [0x10u8, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        let framed = append_crc(&payload);
        assert_eq!(validate(&framed), Some(&payload[..]));
    }

    #[test]
    fn test_any_single_byte_corruption_fails() {
        let payload = [0x60u8, 0x05, 0x00, 0x12, 0x34, 0x56];
        let framed = append_crc(&payload);
        for i in 0..payload.len() {
            let mut corrupted = framed.clone();
            corrupted[i] ^= 0x01;
            assert!(validate(&corrupted).is_none(), "byte {} corruption passed", i);
        }
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(validate(&[0x7E]).is_none());
        assert!(validate(&[]).is_none());
    }
}
