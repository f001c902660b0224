//! Packet capture sink for radio-layer messages
//!
//! Writes a classic pcap file whose records wrap each radio-layer
//! payload in a synthetic Ethernet/IPv4/UDP stack plus a GSMTAP header,
//! so protocol analyzers pick up the air-interface decode on the
//! well-known port. The global header goes out at construction; a
//! truncated session still leaves a valid partial capture behind.

use super::MessageSink;
use crate::aggregate::SessionReport;
use crate::types::{DecodedMessage, MessageBody, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;

/// Classic pcap magic, written little-endian
const PCAP_MAGIC: u32 = 0xA1B2_C3D4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const LINKTYPE_ETHERNET: u32 = 1;
const SNAPLEN: u32 = 65535;

/// Well-known GSMTAP UDP port
const GSMTAP_PORT: u16 = 4729;
/// GSMTAP header: version 2, fixed 4-word length
const GSMTAP_VERSION: u8 = 2;
const GSMTAP_HDR_WORDS: u8 = 4;
/// GSMTAP payload type for LTE RRC
const GSMTAP_TYPE_LTE_RRC: u8 = 0x0D;

const ETHERNET_LEN: usize = 14;
const IPV4_LEN: usize = 20;
const UDP_LEN: usize = 8;
const GSMTAP_LEN: usize = 16;

/// GSMTAP-over-UDP capture writer
pub struct PcapSink<W: Write> {
    out: W,
    records: u64,
}

impl<W: Write> PcapSink<W> {
    pub fn new(mut out: W) -> Result<Self> {
        let mut header = [0u8; 24];
        LittleEndian::write_u32(&mut header[0..4], PCAP_MAGIC);
        LittleEndian::write_u16(&mut header[4..6], PCAP_VERSION_MAJOR);
        LittleEndian::write_u16(&mut header[6..8], PCAP_VERSION_MINOR);
        // thiszone and sigfigs stay zero
        LittleEndian::write_u32(&mut header[16..20], SNAPLEN);
        LittleEndian::write_u32(&mut header[20..24], LINKTYPE_ETHERNET);
        out.write_all(&header)?;
        Ok(Self { out, records: 0 })
    }

    /// Number of capture records written so far
    pub fn records_written(&self) -> u64 {
        self.records
    }

    fn write_record(&mut self, message: &DecodedMessage, payload: &[u8]) -> Result<()> {
        let packet = build_packet(payload);
        let incl_len = packet.len().min(SNAPLEN as usize);

        let mut header = [0u8; 16];
        let ts = message.timestamp;
        LittleEndian::write_u32(&mut header[0..4], ts.timestamp() as u32);
        LittleEndian::write_u32(&mut header[4..8], ts.timestamp_subsec_micros());
        LittleEndian::write_u32(&mut header[8..12], incl_len as u32);
        LittleEndian::write_u32(&mut header[12..16], packet.len() as u32);

        self.out.write_all(&header)?;
        self.out.write_all(&packet[..incl_len])?;
        self.records += 1;
        Ok(())
    }
}

/// Wrap a radio payload in Ethernet + IPv4 + UDP + GSMTAP headers
fn build_packet(payload: &[u8]) -> Vec<u8> {
    let udp_total = UDP_LEN + GSMTAP_LEN + payload.len();
    let ip_total = IPV4_LEN + udp_total;
    let mut packet = Vec::with_capacity(ETHERNET_LEN + ip_total);

    // Ethernet: zero MACs, IPv4 ethertype
    packet.extend_from_slice(&[0u8; 12]);
    packet.extend_from_slice(&[0x08, 0x00]);

    // IPv4 header, network byte order
    let mut ip = [0u8; IPV4_LEN];
    ip[0] = 0x45; // version 4, IHL 5
    ip[2..4].copy_from_slice(&(ip_total as u16).to_be_bytes());
    ip[8] = 64; // TTL
    ip[9] = 17; // UDP
    ip[12..16].copy_from_slice(&[127, 0, 0, 1]);
    ip[16..20].copy_from_slice(&[127, 0, 0, 1]);
    let checksum = ipv4_checksum(&ip);
    ip[10..12].copy_from_slice(&checksum.to_be_bytes());
    packet.extend_from_slice(&ip);

    // UDP header; checksum zero is legal over IPv4
    packet.extend_from_slice(&GSMTAP_PORT.to_be_bytes());
    packet.extend_from_slice(&GSMTAP_PORT.to_be_bytes());
    packet.extend_from_slice(&(udp_total as u16).to_be_bytes());
    packet.extend_from_slice(&[0, 0]);

    // GSMTAP v2 fixed header
    let mut gsmtap = [0u8; GSMTAP_LEN];
    gsmtap[0] = GSMTAP_VERSION;
    gsmtap[1] = GSMTAP_HDR_WORDS;
    gsmtap[2] = GSMTAP_TYPE_LTE_RRC;
    packet.extend_from_slice(&gsmtap);

    packet.extend_from_slice(payload);
    packet
}

fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum = 0u32;
    for pair in header.chunks(2) {
        sum += u16::from_be_bytes([pair[0], pair[1]]) as u32;
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

impl<W: Write> MessageSink for PcapSink<W> {
    fn name(&self) -> &'static str {
        "pcap"
    }

    fn write_message(&mut self, message: &DecodedMessage) -> Result<()> {
        if let MessageBody::RadioLayer(radio) = &message.body {
            self.write_record(message, &radio.payload)?;
        }
        Ok(())
    }

    fn close(&mut self, _report: &SessionReport) -> Result<()> {
        log::debug!("Capture closed with {} records", self.records);
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::types::{
        device_ticks_to_utc, EventRecord, RadioInfo, RadioLayer,
        RadioLayerMessage,
    };

    fn radio_message(payload: &[u8]) -> DecodedMessage {
        DecodedMessage {
            timestamp: device_ticks_to_utc(800u64 << 16),
            device_ticks: 800 << 16,
            radio_id: 0,
            raw: Vec::new(),
            body: MessageBody::RadioLayer(RadioLayerMessage {
                log_code: 0xB0C1,
                layer: RadioLayer::Rrc,
                payload: payload.to_vec(),
                info: RadioInfo::Envelope,
            }),
        }
    }

    fn event_message() -> DecodedMessage {
        DecodedMessage {
            timestamp: device_ticks_to_utc(0),
            device_ticks: 0,
            radio_id: 0,
            raw: Vec::new(),
            body: MessageBody::Event(EventRecord {
                event_id: 1,
                event_name: "X".into(),
                payload: Vec::new(),
                payload_text: String::new(),
            }),
        }
    }

    #[test]
    fn test_global_header_written_up_front() {
        let mut buf = Vec::new();
        PcapSink::new(&mut buf).unwrap();
        assert_eq!(buf.len(), 24);
        assert_eq!(LittleEndian::read_u32(&buf[0..4]), PCAP_MAGIC);
        assert_eq!(LittleEndian::read_u32(&buf[20..24]), LINKTYPE_ETHERNET);
    }

    #[test]
    fn test_only_radio_messages_produce_records() {
        let mut buf = Vec::new();
        {
            let mut sink = PcapSink::new(&mut buf).unwrap();
            sink.write_message(&event_message()).unwrap();
            sink.write_message(&radio_message(&[0xAA, 0xBB])).unwrap();
            assert_eq!(sink.records_written(), 1);
            sink.close(&Aggregator::new("unit").report()).unwrap();
        }
        let expected = 24 + 16 + ETHERNET_LEN + IPV4_LEN + UDP_LEN + GSMTAP_LEN + 2;
        assert_eq!(buf.len(), expected);
    }

    #[test]
    fn test_record_encapsulation() {
        let mut buf = Vec::new();
        {
            let mut sink = PcapSink::new(&mut buf).unwrap();
            sink.write_message(&radio_message(&[0xDE, 0xAD])).unwrap();
        }
        let record = &buf[24..];
        let incl_len = LittleEndian::read_u32(&record[8..12]) as usize;
        let packet = &record[16..16 + incl_len];

        // Ethertype IPv4, protocol UDP, GSMTAP port both ways
        assert_eq!(&packet[12..14], &[0x08, 0x00]);
        assert_eq!(packet[ETHERNET_LEN + 9], 17);
        let udp = &packet[ETHERNET_LEN + IPV4_LEN..];
        assert_eq!(u16::from_be_bytes([udp[0], udp[1]]), GSMTAP_PORT);
        assert_eq!(u16::from_be_bytes([udp[2], udp[3]]), GSMTAP_PORT);
        // GSMTAP version and payload at the tail
        let gsmtap = &udp[UDP_LEN..];
        assert_eq!(gsmtap[0], GSMTAP_VERSION);
        assert_eq!(&packet[packet.len() - 2..], &[0xDE, 0xAD]);
    }

    #[test]
    fn test_ipv4_checksum_validates() {
        let payload = [0x01];
        let packet = build_packet(&payload);
        let ip = &packet[ETHERNET_LEN..ETHERNET_LEN + IPV4_LEN];
        // Re-summing a header including its checksum yields zero
        let mut sum = 0u32;
        for pair in ip.chunks(2) {
            sum += u16::from_be_bytes([pair[0], pair[1]]) as u32;
        }
        while sum > 0xFFFF {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        assert_eq!(sum as u16, 0xFFFF);
    }
}
