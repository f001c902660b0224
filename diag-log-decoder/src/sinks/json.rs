//! Machine-readable JSON document sink
//!
//! One document per session with a fixed set of top-level keys that are
//! always present, so downstream consumers never branch on key
//! existence: an empty session still produces every array. Nodes
//! accumulate in memory and the document is written once at close.

use super::MessageSink;
use crate::aggregate::SessionReport;
use crate::types::{
    hex_packed, ApduExchange, DecodedMessage, MessageBody, RadioInfo, Result,
};
use serde_json::{json, Value};
use std::io::Write;

/// Session document writer with a stable top-level schema
pub struct JsonSink<W: Write> {
    out: W,
    events: Vec<Value>,
    qmi_messages: Vec<Value>,
    apdu_messages: Vec<Value>,
    phone_events: Vec<Value>,
    policy_stats: Vec<Value>,
    radio_messages: Vec<Value>,
    unknown_messages: Vec<Value>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            events: Vec::new(),
            qmi_messages: Vec::new(),
            apdu_messages: Vec::new(),
            phone_events: Vec::new(),
            policy_stats: Vec::new(),
            radio_messages: Vec::new(),
            unknown_messages: Vec::new(),
        }
    }
}

impl<W: Write> MessageSink for JsonSink<W> {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write_message(&mut self, message: &DecodedMessage) -> Result<()> {
        let timestamp = message.timestamp.to_rfc3339();
        match &message.body {
            MessageBody::Event(ev) => {
                self.events.push(json!({
                    "timestamp": timestamp,
                    "radio_id": message.radio_id,
                    "event_id": ev.event_id,
                    "name": ev.event_name,
                    "payload_hex": hex_packed(&ev.payload),
                    "payload_text": ev.payload_text,
                }));
            }
            MessageBody::ServicePacket(pkt) => {
                self.qmi_messages.push(json!({
                    "timestamp": timestamp,
                    "radio_id": message.radio_id,
                    "service_id": pkt.service_id,
                    "service": pkt.service_name,
                    "direction": pkt.direction.to_string(),
                    "msg_id": pkt.msg_id,
                    "counter": pkt.counter,
                    "tlvs": pkt.tlvs.iter().map(|t| json!({
                        "type": t.tlv_type,
                        "length": t.length,
                        "value_hex": hex_packed(&t.value),
                    })).collect::<Vec<_>>(),
                }));
            }
            MessageBody::ApduExchange(exchange) => {
                let node = match exchange {
                    ApduExchange::Command(cmd) => json!({
                        "timestamp": timestamp,
                        "radio_id": message.radio_id,
                        "direction": "command",
                        "instruction": cmd.instruction,
                        "cla": cmd.cla,
                        "ins": cmd.ins,
                        "p1": cmd.p1,
                        "p2": cmd.p2,
                        "p3": cmd.p3,
                        "channel": cmd.channel,
                        "secure_messaging": cmd.secure_messaging,
                        "data_hex": hex_packed(&cmd.data),
                    }),
                    ApduExchange::Response(rsp) => json!({
                        "timestamp": timestamp,
                        "radio_id": message.radio_id,
                        "direction": "response",
                        "sw1": rsp.sw1,
                        "sw2": rsp.sw2,
                        "status": rsp.status,
                        "data_hex": hex_packed(&rsp.data),
                    }),
                };
                self.apdu_messages.push(node);
            }
            MessageBody::PhoneEvent(ev) => {
                self.phone_events.push(json!({
                    "timestamp": timestamp,
                    "radio_id": message.radio_id,
                    "event_id": ev.event_id,
                    "name": ev.event_name,
                    "in_use": ev.in_use,
                    "operating_mode": ev.operating_mode,
                }));
            }
            MessageBody::PolicyStats(stats) => {
                self.policy_stats.push(json!({
                    "timestamp": timestamp,
                    "radio_id": message.radio_id,
                    "policy_num": stats.policy_num,
                    "policy_type": stats.policy_type,
                    "num_rules": stats.num_rules,
                    "suspend_count": stats.suspend_count,
                    "elapsed_time": stats.elapsed_time,
                    "is_policy_init": stats.is_policy_init,
                }));
            }
            MessageBody::RadioLayer(radio) => {
                let info = match &radio.info {
                    RadioInfo::CellInfo(c) => json!({"cell_info": c}),
                    RadioInfo::Measurement(m) => json!({"measurement": m}),
                    RadioInfo::Envelope => json!({"length": radio.payload.len()}),
                };
                self.radio_messages.push(json!({
                    "timestamp": timestamp,
                    "radio_id": message.radio_id,
                    "log_code": format!("0x{:04X}", radio.log_code),
                    "layer": radio.layer.to_string(),
                    "info": info,
                }));
            }
            MessageBody::Unknown(u) => {
                self.unknown_messages.push(json!({
                    "timestamp": timestamp,
                    "radio_id": message.radio_id,
                    "primary": format!("0x{:02X}", u.primary),
                    "log_code": u.log_code.map(|c| format!("0x{:04X}", c)),
                    "name": u.name,
                    "reason": u.reason,
                    "raw_hex": hex_packed(&message.raw),
                }));
            }
        }
        Ok(())
    }

    fn close(&mut self, report: &SessionReport) -> Result<()> {
        let document = json!({
            "file_info": {
                "source": report.metadata.source_name,
                "started_at": report.metadata.started_at.map(|t| t.to_rfc3339()),
            },
            "summary": report.summary,
            "cell_info": report.cells,
            "measurements": report.measurements,
            "events": std::mem::take(&mut self.events),
            "qmi_messages": std::mem::take(&mut self.qmi_messages),
            "apdu_messages": std::mem::take(&mut self.apdu_messages),
            "phone_events": std::mem::take(&mut self.phone_events),
            "policy_stats": std::mem::take(&mut self.policy_stats),
            "radio_messages": std::mem::take(&mut self.radio_messages),
            "unknown_messages": std::mem::take(&mut self.unknown_messages),
            "security_info": [],
            "ca_combos": [],
        });
        serde_json::to_writer_pretty(&mut self.out, &document)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
