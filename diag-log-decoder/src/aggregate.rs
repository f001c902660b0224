//! Session aggregation
//!
//! Pure accumulation over the decoded message stream: monotone counters,
//! a keyed cell table updated in place on re-observation, and an
//! append-only measurement list. The aggregator never mutates messages
//! and never drops them; sinks consume the snapshot it produces at the
//! end of the session.

use crate::types::{
    DecodedMessage, MessageBody, RadioInfo, Timestamp,
};
use serde::Serialize;
use std::collections::HashMap;

/// Monotone per-session counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSummary {
    pub total_messages: u64,
    pub valid_frames: u64,
    pub invalid_frames: u64,
    pub events: u64,
    pub service_packets: u64,
    pub apdu_exchanges: u64,
    pub phone_events: u64,
    pub policy_stats: u64,
    pub radio_messages: u64,
    pub unknown_messages: u64,
}

/// One serving cell, keyed by (earfcn, pci); re-observation refreshes
/// the mutable fields instead of appending a duplicate
#[derive(Debug, Clone, Serialize)]
pub struct CellRecord {
    pub earfcn: u32,
    pub pci: u16,
    pub cell_identity: u32,
    pub tac: u16,
    pub band: u32,
    pub mcc: u16,
    pub mnc: u16,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub observations: u64,
}

/// One measurement sample; the list is append-only
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementRecord {
    pub timestamp: Timestamp,
    pub earfcn: u32,
    pub pci: u16,
    pub sfn: u16,
    pub rsrp_dbm: f64,
    pub rsrq_db: f64,
}

/// Session-level metadata carried into the report
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMetadata {
    pub source_name: String,
    pub started_at: Option<Timestamp>,
}

/// Snapshot handed to sinks at close
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub cells: Vec<CellRecord>,
    pub measurements: Vec<MeasurementRecord>,
    pub metadata: SessionMetadata,
}

/// Accumulates session state from the decoded message stream
#[derive(Debug, Default)]
pub struct Aggregator {
    summary: SessionSummary,
    cells: HashMap<(u32, u16), CellRecord>,
    measurements: Vec<MeasurementRecord>,
    metadata: SessionMetadata,
}

impl Aggregator {
    pub fn new(source_name: &str) -> Self {
        Self {
            metadata: SessionMetadata {
                source_name: source_name.to_string(),
                started_at: None,
            },
            ..Default::default()
        }
    }

    /// Count a frame that passed CRC validation
    pub fn note_valid_frame(&mut self) {
        self.summary.valid_frames += 1;
    }

    /// Count a frame dropped by CRC validation
    pub fn note_invalid_frame(&mut self) {
        self.summary.invalid_frames += 1;
    }

    /// Fold one decoded message into the session state
    pub fn observe(&mut self, message: &DecodedMessage) {
        self.summary.total_messages += 1;
        if self.metadata.started_at.is_none() {
            self.metadata.started_at = Some(message.timestamp);
        }

        match &message.body {
            MessageBody::Event(_) => self.summary.events += 1,
            MessageBody::ServicePacket(_) => self.summary.service_packets += 1,
            MessageBody::ApduExchange(_) => self.summary.apdu_exchanges += 1,
            MessageBody::PhoneEvent(_) => self.summary.phone_events += 1,
            MessageBody::PolicyStats(_) => self.summary.policy_stats += 1,
            MessageBody::RadioLayer(radio) => {
                self.summary.radio_messages += 1;
                match &radio.info {
                    RadioInfo::CellInfo(info) => {
                        self.observe_cell(message.timestamp, info);
                    }
                    RadioInfo::Measurement(m) => {
                        self.measurements.push(MeasurementRecord {
                            timestamp: message.timestamp,
                            earfcn: m.earfcn,
                            pci: m.pci,
                            sfn: m.sfn,
                            rsrp_dbm: m.rsrp_dbm,
                            rsrq_db: m.rsrq_db,
                        });
                    }
                    RadioInfo::Envelope => {}
                }
            }
            MessageBody::Unknown(_) => self.summary.unknown_messages += 1,
        }
    }

    fn observe_cell(&mut self, timestamp: Timestamp, info: &crate::types::CellInfo) {
        let key = (info.earfcn_dl, info.pci);
        self.cells
            .entry(key)
            .and_modify(|cell| {
                cell.cell_identity = info.cell_identity;
                cell.tac = info.tac;
                cell.band = info.band;
                cell.mcc = info.mcc;
                cell.mnc = info.mnc;
                cell.last_seen = timestamp;
                cell.observations += 1;
            })
            .or_insert_with(|| CellRecord {
                earfcn: info.earfcn_dl,
                pci: info.pci,
                cell_identity: info.cell_identity,
                tac: info.tac,
                band: info.band,
                mcc: info.mcc,
                mnc: info.mnc,
                first_seen: timestamp,
                last_seen: timestamp,
                observations: 1,
            });
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Snapshot the session state for the sinks. Cells sort by key so
    /// report output is deterministic.
    pub fn report(&self) -> SessionReport {
        let mut cells: Vec<CellRecord> = self.cells.values().cloned().collect();
        cells.sort_by_key(|c| (c.earfcn, c.pci));
        SessionReport {
            summary: self.summary.clone(),
            cells,
            measurements: self.measurements.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
