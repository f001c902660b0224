//! Smart-card APDU sub-decoder (log code 0x1098)
//!
//! The body starts with a direction marker: 0 for host-to-card commands,
//! 1 for card-to-host responses. Commands and responses are emitted as
//! independent messages; request/response correlation is a consumer
//! concern, not something this decoder forces.

use super::DecodeOutput;
use crate::types::{
    ApduCommand, ApduExchange, ApduResponse, DiagError, MessageBody, Result,
};

/// Instruction-byte name table; unresolved values render as raw hex
const INSTRUCTION_NAMES: &[(u8, &str)] = &[
    (0x20, "VERIFY"),
    (0x84, "GET CHALLENGE"),
    (0x88, "AUTHENTICATE"),
    (0xA4, "SELECT"),
    (0xB0, "READ BINARY"),
    (0xB2, "READ RECORD"),
    (0xC0, "GET RESPONSE"),
    (0xD6, "UPDATE BINARY"),
    (0xDC, "UPDATE RECORD"),
    (0xF2, "STATUS"),
];

/// Direction marker values in the envelope
const DIRECTION_TX: u8 = 0;
const DIRECTION_RX: u8 = 1;

pub fn instruction_name(ins: u8) -> String {
    INSTRUCTION_NAMES
        .iter()
        .find(|(code, _)| *code == ins)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("UNKNOWN (0x{:02X})", ins))
}

/// Resolve a status-word pair against the vendor meaning table
pub fn status_meaning(sw1: u8, sw2: u8) -> String {
    match (sw1, sw2) {
        (0x90, 0x00) => "Normal ending of the command".to_string(),
        (0x91, _) => format!("Normal ending with extra info (0x{:02X})", sw2),
        (0x92, _) => format!("Command successful with warning (0x{:02X})", sw2),
        (0x93, _) => format!("Command successful but after retry (0x{:02X})", sw2),
        (0x94, _) => format!("Error, no precise diagnosis (0x{:02X})", sw2),
        (0x98, _) => format!("Security error (0x{:02X})", sw2),
        (0x6A, _) => format!("Wrong parameter(s) P1-P2 (0x{:02X})", sw2),
        (0x6B, _) => "Wrong parameter(s) P1-P2".to_string(),
        (0x6D, _) => "Instruction code not supported".to_string(),
        (0x6E, _) => "Class not supported".to_string(),
        (0x6F, _) => "Technical problem, no precise diagnosis".to_string(),
        _ => format!("Unknown status (0x{:02X} 0x{:02X})", sw1, sw2),
    }
}

/// Decode a smart-card debug packet body
pub fn decode(body: &[u8]) -> Result<Vec<DecodeOutput>> {
    if body.len() < 2 {
        return Err(DiagError::TruncatedPayload {
            expected: 2,
            actual: body.len(),
        });
    }
    let data = &body[1..];

    let exchange = match body[0] {
        DIRECTION_TX => ApduExchange::Command(decode_command(data)?),
        DIRECTION_RX => ApduExchange::Response(decode_response(data)?),
        other => {
            return Err(DiagError::UnknownVersion(other));
        }
    };

    Ok(vec![DecodeOutput::from_envelope(MessageBody::ApduExchange(
        exchange,
    ))])
}

fn decode_command(data: &[u8]) -> Result<ApduCommand> {
    if data.len() < 5 {
        return Err(DiagError::TruncatedPayload {
            expected: 5,
            actual: data.len(),
        });
    }
    let (cla, ins, p1, p2, p3) = (data[0], data[1], data[2], data[3], data[4]);
    Ok(ApduCommand {
        cla,
        ins,
        p1,
        p2,
        p3,
        instruction: instruction_name(ins),
        // Logical channel lives in the low bits of the class byte;
        // bits 2-3 flag secure messaging
        channel: cla & 0x03,
        secure_messaging: cla & 0x0C != 0,
        data: data[5..].to_vec(),
    })
}

fn decode_response(data: &[u8]) -> Result<ApduResponse> {
    if data.len() < 2 {
        return Err(DiagError::TruncatedPayload {
            expected: 2,
            actual: data.len(),
        });
    }
    let (sw1, sw2) = (data[data.len() - 2], data[data.len() - 1]);
    Ok(ApduResponse {
        sw1,
        sw2,
        status: status_meaning(sw1, sw2),
        data: data[..data.len() - 2].to_vec(),
    })
}
