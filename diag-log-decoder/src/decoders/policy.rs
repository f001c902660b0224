//! Policy-manager statistics sub-decoder (log code 0x199B)

use super::DecodeOutput;
use crate::types::{DiagError, MessageBody, PolicyStats, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Fixed layout length: all fields up to and including the init flag
const MIN_LEN: usize = 18;

/// Decode a policy statistics packet body
pub fn decode(body: &[u8]) -> Result<Vec<DecodeOutput>> {
    if body.len() < MIN_LEN {
        return Err(DiagError::TruncatedPayload {
            expected: MIN_LEN,
            actual: body.len(),
        });
    }

    Ok(vec![DecodeOutput::from_envelope(MessageBody::PolicyStats(
        PolicyStats {
            version: body[0],
            policy_num: LittleEndian::read_u16(&body[1..3]),
            policy_type: body[3],
            policy_version: body[4],
            last_exec_time: LittleEndian::read_u32(&body[5..9]),
            elapsed_time: LittleEndian::read_u32(&body[9..13]),
            num_rules: LittleEndian::read_u16(&body[13..15]),
            suspend_count: LittleEndian::read_u16(&body[15..17]),
            is_policy_init: body[17] != 0,
        },
    ))])
}
