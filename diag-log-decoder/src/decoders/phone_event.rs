//! Phone-state event sub-decoder (log code 0x1273)
//!
//! Call-manager phone events: a version byte, a 16-bit event id resolved
//! against the named event table, and for packets long enough to carry
//! them, the common in-use/operating-mode fields. Unrecognized ids and
//! mode values pass through numerically rather than failing.

use super::DecodeOutput;
use crate::types::{DiagError, MessageBody, PhoneEvent, Result};
use byteorder::{ByteOrder, LittleEndian};

const EVENT_NAMES: &[&str] = &[
    "CM_PH_EVENT_OPRT_MODE",
    "CM_PH_EVENT_TEST_CONTROL_TYPE",
    "CM_PH_EVENT_SYS_SEL_PREF",
    "CM_PH_EVENT_ANSWER_VOICE",
    "CM_PH_EVENT_NAM_SEL",
    "CM_PH_EVENT_CURR_NAM",
    "CM_PH_EVENT_IN_USE_STATE",
    "CM_PH_EVENT_CDMA_LOCK_MODE",
    "CM_PH_EVENT_UIM_NOT_AVAILABLE",
    "CM_PH_EVENT_SUBSCRIPTION_AVAILABLE",
    "CM_PH_EVENT_SUBSCRIPTION_NOT_AVAILABLE",
    "CM_PH_EVENT_SUBSCRIPTION_CHANGED",
    "CM_PH_EVENT_AVAILABLE_NETWORKS_CONF",
    "CM_PH_EVENT_PREFERRED_NETWORKS_CONF",
    "CM_PH_EVENT_FUNDS_LOW",
    "CM_PH_EVENT_WAKEUP_FROM_STANDBY",
    "CM_PH_EVENT_NVRUIM_CONFIG_CHANGED",
    "CM_PH_EVENT_PREFERRED_NETWORKS",
    "CM_PH_EVENT_PS_ATTACH_FAILED",
    "CM_PH_EVENT_RESET_ACM_COMPLETED",
    "CM_PH_EVENT_DDTM_STATUS",
];

const OPERATING_MODES: &[&str] = &[
    "Poweroff",
    "FTM",
    "Offline",
    "Offline AMPS",
    "Offline CDMA",
    "Online",
    "Low power mode",
    "Reset",
];

pub fn phone_event_name(id: u16) -> String {
    EVENT_NAMES
        .get(id as usize)
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| format!("Unknown({})", id))
}

pub fn operating_mode_name(mode: u8) -> String {
    OPERATING_MODES
        .get(mode as usize)
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| format!("Unknown({})", mode))
}

/// Decode a phone-state event packet body
pub fn decode(body: &[u8]) -> Result<Vec<DecodeOutput>> {
    if body.len() < 4 {
        return Err(DiagError::TruncatedPayload {
            expected: 4,
            actual: body.len(),
        });
    }

    let event_id = LittleEndian::read_u16(&body[1..3]);
    let (in_use, operating_mode) = if body.len() >= 10 {
        (Some(body[3] != 0), Some(operating_mode_name(body[4])))
    } else {
        (None, None)
    };

    Ok(vec![DecodeOutput::from_envelope(MessageBody::PhoneEvent(
        PhoneEvent {
            version: body[0],
            event_id,
            event_name: phone_event_name(event_id),
            in_use,
            operating_mode,
        },
    ))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_mode_event() {
        // Event 0 (OPRT_MODE), in use, mode 5 (Online), padded to 10 bytes
        let body = [0x01, 0x00, 0x00, 0x01, 0x05, 0, 0, 0, 0, 0];
        let outputs = decode(&body).unwrap();
        match &outputs[0].body {
            MessageBody::PhoneEvent(ev) => {
                assert_eq!(ev.event_name, "CM_PH_EVENT_OPRT_MODE");
                assert_eq!(ev.in_use, Some(true));
                assert_eq!(ev.operating_mode.as_deref(), Some("Online"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_short_packet_omits_common_fields() {
        let body = [0x01, 0x0B, 0x00, 0x00];
        let outputs = decode(&body).unwrap();
        match &outputs[0].body {
            MessageBody::PhoneEvent(ev) => {
                assert_eq!(ev.event_name, "CM_PH_EVENT_SUBSCRIPTION_CHANGED");
                assert_eq!(ev.in_use, None);
                assert_eq!(ev.operating_mode, None);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_and_mode_pass_through() {
        assert_eq!(phone_event_name(77), "Unknown(77)");
        assert_eq!(operating_mode_name(99), "Unknown(99)");
    }

    #[test]
    fn test_truncated_rejected() {
        assert!(decode(&[0x01, 0x00]).is_err());
    }
}
