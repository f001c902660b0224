//! Human-readable text report sink
//!
//! Mirrors the layout field engineers already read: a `%`-prefixed file
//! header, one block per message with a timestamp line and tab-indented
//! detail lines, raw payloads wrapped at 16 hex bytes, and a trailing
//! analysis summary. Formatting oddities (double spaces, literal tabs)
//! are part of the layout and kept as-is so existing tooling and eyes
//! stay compatible.

use super::MessageSink;
use crate::aggregate::SessionReport;
use crate::types::{
    hex_spaced, ApduExchange, DecodedMessage, MessageBody, RadioInfo, Result,
    Timestamp,
};
use std::io::Write;

/// Timestamp layout used on every message line
const TIME_FORMAT: &str = "%Y %b %e  %H:%M:%S%.3f";

/// QCAT-style text report writer
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "%MOBILE PARSED MESSAGE FILE")?;
        writeln!(out, "%Generated by diag-log-decoder")?;
        writeln!(out)?;
        Ok(Self { out })
    }

    fn header_line(&mut self, ts: Timestamp, radio_id: u8, code: u32, label: &str, detail: &str) -> Result<()> {
        writeln!(
            self.out,
            "{}  [{:02}]  0x{:04X}  {}  --  {}",
            ts.format(TIME_FORMAT),
            radio_id,
            code,
            label,
            detail
        )?;
        Ok(())
    }

    /// Tab-indented hex dump wrapped at 16 bytes per line
    fn hex_block(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(16) {
            writeln!(self.out, "\t\t{}", hex_spaced(chunk))?;
        }
        Ok(())
    }

    fn write_summary(&mut self, report: &SessionReport) -> Result<()> {
        let s = &report.summary;
        writeln!(self.out)?;
        writeln!(self.out, "%ANALYSIS SUMMARY")?;
        writeln!(self.out, "\tSource: {}", report.metadata.source_name)?;
        writeln!(self.out, "\tValid frames:     {}", s.valid_frames)?;
        writeln!(self.out, "\tInvalid frames:   {}", s.invalid_frames)?;
        writeln!(self.out, "\tTotal messages:   {}", s.total_messages)?;
        writeln!(self.out, "\tEvents:           {}", s.events)?;
        writeln!(self.out, "\tQMI packets:      {}", s.service_packets)?;
        writeln!(self.out, "\tAPDU exchanges:   {}", s.apdu_exchanges)?;
        writeln!(self.out, "\tPhone events:     {}", s.phone_events)?;
        writeln!(self.out, "\tPolicy stats:     {}", s.policy_stats)?;
        writeln!(self.out, "\tRadio messages:   {}", s.radio_messages)?;
        writeln!(self.out, "\tUnknown messages: {}", s.unknown_messages)?;

        if !report.cells.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "%SERVING CELLS")?;
            for cell in &report.cells {
                writeln!(
                    self.out,
                    "\tEARFCN {}  PCI {}  TAC {}  Band {}  MCC/MNC {}/{}  ({} observations)",
                    cell.earfcn, cell.pci, cell.tac, cell.band, cell.mcc, cell.mnc,
                    cell.observations
                )?;
            }
        }
        if !report.measurements.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "%MEASUREMENTS")?;
            for m in &report.measurements {
                writeln!(
                    self.out,
                    "\t{}  EARFCN {}  PCI {}  RSRP {:.2} dBm  RSRQ {:.2} dB",
                    m.timestamp.format(TIME_FORMAT),
                    m.earfcn,
                    m.pci,
                    m.rsrp_dbm,
                    m.rsrq_db
                )?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> MessageSink for TextSink<W> {
    fn name(&self) -> &'static str {
        "text"
    }

    fn write_message(&mut self, message: &DecodedMessage) -> Result<()> {
        let ts = message.timestamp;
        let radio_id = message.radio_id;

        match &message.body {
            MessageBody::Event(ev) => {
                self.header_line(ts, radio_id, ev.event_id as u32, "Event", &ev.event_name)?;
                write!(
                    self.out,
                    "\t{} Event  0 : {} (ID={})",
                    ts.format("%H:%M:%S%.3f"),
                    ev.event_name,
                    ev.event_id
                )?;
                if ev.payload.is_empty() {
                    writeln!(self.out)?;
                } else {
                    writeln!(self.out, "  Payload = {} bytes", ev.payload.len())?;
                    self.hex_block(&ev.payload)?;
                }
                if !ev.payload_text.is_empty() {
                    writeln!(self.out, "\t\tPayload String = {}", ev.payload_text)?;
                }
            }
            MessageBody::ServicePacket(pkt) => {
                let service = pkt
                    .service_name
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("Service {}", pkt.service_id));
                self.header_line(
                    ts,
                    radio_id,
                    0x1544,
                    "QMI Link",
                    &format!("{} {}", service, pkt.direction),
                )?;
                writeln!(
                    self.out,
                    "\tMsgID = 0x{:04X}  Counter = {}  Handle = 0x{:08X}",
                    pkt.msg_id, pkt.counter, pkt.con_handle
                )?;
                for tlv in &pkt.tlvs {
                    writeln!(
                        self.out,
                        "\tTLV 0x{:02X} ({} bytes)",
                        tlv.tlv_type, tlv.length
                    )?;
                    if !tlv.value.is_empty() {
                        self.hex_block(&tlv.value)?;
                    }
                }
            }
            MessageBody::ApduExchange(exchange) => match exchange {
                ApduExchange::Command(cmd) => {
                    self.header_line(ts, radio_id, 0x1098, "RUIM Debug", &cmd.instruction)?;
                    writeln!(
                        self.out,
                        "\tCLA=0x{:02X} INS=0x{:02X} P1=0x{:02X} P2=0x{:02X} P3=0x{:02X}  Channel {}{}",
                        cmd.cla,
                        cmd.ins,
                        cmd.p1,
                        cmd.p2,
                        cmd.p3,
                        cmd.channel,
                        if cmd.secure_messaging { "  (secure messaging)" } else { "" }
                    )?;
                    if !cmd.data.is_empty() {
                        self.hex_block(&cmd.data)?;
                    }
                }
                ApduExchange::Response(rsp) => {
                    self.header_line(ts, radio_id, 0x1098, "RUIM Debug", "Response")?;
                    writeln!(
                        self.out,
                        "\tSW1=0x{:02X} SW2=0x{:02X}  {}",
                        rsp.sw1, rsp.sw2, rsp.status
                    )?;
                    if !rsp.data.is_empty() {
                        self.hex_block(&rsp.data)?;
                    }
                }
            },
            MessageBody::PhoneEvent(ev) => {
                self.header_line(ts, radio_id, 0x1273, "CM Phone Event", &ev.event_name)?;
                if let Some(mode) = &ev.operating_mode {
                    writeln!(
                        self.out,
                        "\tOperating mode = {}  In use = {}",
                        mode,
                        ev.in_use.unwrap_or(false)
                    )?;
                }
            }
            MessageBody::PolicyStats(stats) => {
                self.header_line(
                    ts,
                    radio_id,
                    0x199B,
                    "PM Policy Stats",
                    &format!("Policy {}", stats.policy_num),
                )?;
                writeln!(
                    self.out,
                    "\tRules = {}  Suspended = {}  Elapsed = {} s  Init = {}",
                    stats.num_rules, stats.suspend_count, stats.elapsed_time,
                    stats.is_policy_init
                )?;
            }
            MessageBody::RadioLayer(radio) => {
                self.header_line(
                    ts,
                    radio_id,
                    radio.log_code as u32,
                    "Radio",
                    &radio.layer.to_string(),
                )?;
                match &radio.info {
                    RadioInfo::CellInfo(info) => {
                        writeln!(
                            self.out,
                            "\tServing cell: PCI {}  EARFCN {}/{}  TAC {}  Band {}  MCC/MNC {}/{}",
                            info.pci, info.earfcn_dl, info.earfcn_ul, info.tac,
                            info.band, info.mcc, info.mnc
                        )?;
                    }
                    RadioInfo::Measurement(m) => {
                        writeln!(
                            self.out,
                            "\tMeasurement: EARFCN {}  PCI {}  SFN {}.{}  RSRP {:.2} dBm  RSRQ {:.2} dB",
                            m.earfcn, m.pci, m.sfn, m.subfn, m.rsrp_dbm, m.rsrq_db
                        )?;
                    }
                    RadioInfo::Envelope => {
                        writeln!(self.out, "\t{} bytes", radio.payload.len())?;
                        self.hex_block(&radio.payload)?;
                    }
                }
            }
            MessageBody::Unknown(u) => {
                let code = u.log_code.map(|c| c as u32).unwrap_or(u.primary as u32);
                let detail = match u.name {
                    Some(name) => name.to_string(),
                    None => format!("primary 0x{:02X}", u.primary),
                };
                self.header_line(ts, radio_id, code, "Unknown", &detail)?;
                if let Some(reason) = &u.reason {
                    writeln!(self.out, "\t{}", reason)?;
                }
                if !message.raw.is_empty() {
                    self.hex_block(&message.raw)?;
                }
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn close(&mut self, report: &SessionReport) -> Result<()> {
        self.write_summary(report)
    }
}
