//! Incremental frame parser: feed arbitrary byte chunks, get back decoded
//! messages and accounted garbage.
//!
//! The parser hunts for a start magic, reads the fixed header, then waits for
//! the full payload and trailer. Anything that is not a valid frame start is
//! surfaced one byte at a time as [`ParserEvent::BadData`] so resync never
//! skips a real frame hiding inside garbage. A frame whose checksum fails is
//! still decoded and returned, flagged with `crc_ok = false`; dropping it
//! silently would hide link corruption from the caller.
//!
//! The parser follows the sender's framing generation: seeing the other
//! version's magic at the head of the buffer switches the expected version
//! for all subsequent frames.

use crate::codec;
use crate::frame::{self, FrameHeader, MavlinkVersion, CRC_LEN, HEADER_LEN};
use crate::layout::CompiledDialect;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Running totals for the per-system sequence-number gap accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceStats {
    pub lost: u64,
    pub received: u64,
}

impl SequenceStats {
    /// Estimated loss as a percentage of all frames the peers sent.
    pub fn loss_percent(&self) -> f64 {
        let total = self.lost + self.received;
        if total == 0 {
            0.0
        } else {
            self.lost as f64 * 100.0 / total as f64
        }
    }
}

/// Why a run of bytes was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadDataReason {
    /// Byte at the head of the buffer is not a known start magic.
    BadPrefix,
    /// Header named a message id the dialect does not define.
    UnknownMessageId,
}

/// Bytes the parser discarded, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadData {
    pub bytes: Vec<u8>,
    pub reason: BadDataReason,
}

/// A fully parsed frame: header, decoded fields, raw payload, CRC verdict.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub version: MavlinkVersion,
    pub header: FrameHeader,
    pub name: String,
    pub values: HashMap<String, Value>,
    pub payload: Vec<u8>,
    pub crc_ok: bool,
}

#[derive(Debug, Clone)]
pub enum ParserEvent {
    Message(DecodedMessage),
    BadData(BadData),
}

/// Outcome of one poll of the buffer.
#[derive(Debug, Clone)]
pub enum ParseStatus {
    Event(ParserEvent),
    /// Not enough buffered bytes; the value is a read-size hint, never a
    /// count of discarded bytes.
    NeedMore(usize),
}

/// Stateful stream parser. One per connection; the compiled dialect is
/// shared, the buffer and counters are not.
pub struct ParserState {
    dialect: Arc<CompiledDialect>,
    buf: Vec<u8>,
    version: MavlinkVersion,
    last_seq: HashMap<u8, u8>,
    stats: SequenceStats,
}

impl ParserState {
    pub fn new(dialect: Arc<CompiledDialect>) -> Self {
        Self::with_version(dialect, MavlinkVersion::V10)
    }

    pub fn with_version(dialect: Arc<CompiledDialect>, version: MavlinkVersion) -> Self {
        ParserState {
            dialect,
            buf: Vec::new(),
            version,
            last_seq: HashMap::new(),
            stats: SequenceStats::default(),
        }
    }

    /// Framing generation the parser currently expects.
    pub fn protocol_version(&self) -> MavlinkVersion {
        self.version
    }

    pub fn loss_stats(&self) -> SequenceStats {
        self.stats
    }

    /// Estimated packet loss percentage across all sending systems.
    pub fn packet_loss(&self) -> f64 {
        self.stats.loss_percent()
    }

    /// How many more bytes a read should fetch to make progress. Zero means
    /// the buffer already holds at least one complete event.
    pub fn needed_bytes(&self) -> usize {
        if self.buf.is_empty() {
            return 1;
        }
        if MavlinkVersion::from_magic(self.buf[0]).is_none() {
            // Garbage at the head is already an event.
            return 0;
        }
        if self.buf.len() < 1 + HEADER_LEN {
            return 1 + HEADER_LEN - self.buf.len();
        }
        let frame_len = 1 + HEADER_LEN + self.buf[1] as usize + CRC_LEN;
        frame_len.saturating_sub(self.buf.len())
    }

    /// Feed a chunk and drain every event it completes.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<ParserEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        loop {
            match self.poll() {
                ParseStatus::Event(ev) => events.push(ev),
                ParseStatus::NeedMore(_) => break,
            }
        }
        events
    }

    /// Try to produce one event from the buffered bytes.
    pub fn poll(&mut self) -> ParseStatus {
        let Some(&head) = self.buf.first() else {
            return ParseStatus::NeedMore(1);
        };

        let Some(seen_version) = MavlinkVersion::from_magic(head) else {
            trace!(byte = head, "discarding non-magic byte");
            self.buf.remove(0);
            return ParseStatus::Event(ParserEvent::BadData(BadData {
                bytes: vec![head],
                reason: BadDataReason::BadPrefix,
            }));
        };

        if seen_version != self.version {
            debug!(from = ?self.version, to = ?seen_version, "protocol version switch");
            self.version = seen_version;
        }

        if self.buf.len() < 1 + HEADER_LEN {
            return ParseStatus::NeedMore(1 + HEADER_LEN - self.buf.len());
        }

        let header = FrameHeader {
            payload_len: self.buf[1],
            sequence: self.buf[2],
            system_id: self.buf[3],
            component_id: self.buf[4],
            message_id: self.buf[5],
        };

        let Some(message) = self.dialect.message_by_id(header.message_id) else {
            // Unknown id: the magic byte was a false start. Consume only it
            // so a real frame starting inside the header bytes survives.
            debug!(id = header.message_id, "unknown message id, resyncing");
            let byte = self.buf.remove(0);
            return ParseStatus::Event(ParserEvent::BadData(BadData {
                bytes: vec![byte],
                reason: BadDataReason::UnknownMessageId,
            }));
        };

        let frame_len = 1 + HEADER_LEN + header.payload_len as usize + CRC_LEN;
        if self.buf.len() < frame_len {
            return ParseStatus::NeedMore(frame_len - self.buf.len());
        }

        let body = &self.buf[1..frame_len - CRC_LEN];
        let payload = body[HEADER_LEN..].to_vec();
        let expected = frame::frame_checksum(body, message.layout.crc_extra);
        let got = u16::from_le_bytes([self.buf[frame_len - 2], self.buf[frame_len - 1]]);
        let crc_ok = expected == got;

        let values = codec::unpack_zero_extended(message, &payload);
        let name = message.name.clone();
        self.buf.drain(..frame_len);

        if crc_ok {
            self.account_sequence(header.system_id, header.sequence);
        } else {
            // A corrupted sequence byte would poison the loss counters.
            debug!(
                id = header.message_id,
                expected, got, "checksum mismatch, frame flagged"
            );
        }

        ParseStatus::Event(ParserEvent::Message(DecodedMessage {
            version: seen_version,
            header,
            name,
            values,
            payload,
            crc_ok,
        }))
    }

    fn account_sequence(&mut self, system_id: u8, sequence: u8) {
        match self.last_seq.insert(system_id, sequence) {
            None => {
                self.stats.received += 1;
            }
            Some(last) => {
                let dist = sequence.wrapping_sub(last);
                if dist >= 1 {
                    self.stats.lost += dist as u64 - 1;
                    self.stats.received += 1;
                } else {
                    // Duplicate sequence number: counted as received, no gap.
                    self.stats.received += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode, MAV_STX_V10};
    use crate::layout::compile_source;

    const DIALECT: &str = r#"
        message 0 PING {
            value: u32;
        }
        message 5 PAIR {
            first: u32;
            second: u32;
        }
    "#;

    fn dialect() -> Arc<CompiledDialect> {
        Arc::new(compile_source(DIALECT).expect("compile"))
    }

    fn ping_frame(dialect: &CompiledDialect, seq: u8, sysid: u8) -> Vec<u8> {
        let mut values = HashMap::new();
        values.insert("value".to_string(), Value::U32(seq as u32));
        encode(dialect, MavlinkVersion::V10, 0, sysid, 1, seq, &values).expect("encode")
    }

    #[test]
    fn clean_frame_decodes() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        let events = parser.push_bytes(&ping_frame(&d, 0, 1));
        assert_eq!(events.len(), 1);
        match &events[0] {
            ParserEvent::Message(m) => {
                assert_eq!(m.name, "PING");
                assert!(m.crc_ok);
                assert_eq!(m.values.get("value").and_then(Value::as_u64), Some(0));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn junk_prefix_yields_one_bad_data_per_byte() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        let mut stream = vec![0x00, 0x13, 0x37];
        stream.extend(ping_frame(&d, 0, 1));
        let events = parser.push_bytes(&stream);
        assert_eq!(events.len(), 4);
        for ev in &events[..3] {
            match ev {
                ParserEvent::BadData(b) => {
                    assert_eq!(b.bytes.len(), 1);
                    assert_eq!(b.reason, BadDataReason::BadPrefix);
                }
                other => panic!("expected bad data, got {:?}", other),
            }
        }
        assert!(matches!(events[3], ParserEvent::Message(_)));
    }

    #[test]
    fn split_frame_across_pushes() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        let frame = ping_frame(&d, 0, 1);
        let (a, b) = frame.split_at(4);
        assert!(parser.push_bytes(a).is_empty());
        let events = parser.push_bytes(b);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn corrupted_crc_is_flagged_not_dropped() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        let mut frame = ping_frame(&d, 0, 1);
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        let events = parser.push_bytes(&frame);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ParserEvent::Message(m) => assert!(!m.crc_ok),
            other => panic!("expected message, got {:?}", other),
        }
        // Corrupt frames do not feed the loss counters.
        assert_eq!(parser.loss_stats(), SequenceStats::default());
        // The stream recovers immediately.
        let events = parser.push_bytes(&ping_frame(&d, 1, 1));
        assert!(matches!(events[0], ParserEvent::Message(_)));
    }

    #[test]
    fn unknown_message_id_resyncs_one_byte() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        // A fake header naming id 200, followed by a real frame.
        let mut stream = vec![MAV_STX_V10, 4, 0, 1, 1, 200];
        stream.extend(ping_frame(&d, 0, 1));
        let events = parser.push_bytes(&stream);
        let bad: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ParserEvent::BadData(_)))
            .collect();
        assert!(!bad.is_empty());
        match &events[0] {
            ParserEvent::BadData(b) => {
                assert_eq!(b.reason, BadDataReason::UnknownMessageId);
                assert_eq!(b.bytes, vec![MAV_STX_V10]);
            }
            other => panic!("expected bad data, got {:?}", other),
        }
        assert!(matches!(events.last(), Some(ParserEvent::Message(_))));
    }

    #[test]
    fn sequence_gap_accounting() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        for seq in [0u8, 1, 2, 5, 6] {
            let events = parser.push_bytes(&ping_frame(&d, seq, 1));
            assert_eq!(events.len(), 1);
        }
        let stats = parser.loss_stats();
        assert_eq!(stats.lost, 2);
        assert_eq!(stats.received, 5);
        assert!((stats.loss_percent() - 2.0 * 100.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn sequence_wraps_at_255() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        for seq in [254u8, 255, 0, 1] {
            parser.push_bytes(&ping_frame(&d, seq, 1));
        }
        let stats = parser.loss_stats();
        assert_eq!(stats.lost, 0);
        assert_eq!(stats.received, 4);
    }

    #[test]
    fn loss_is_tracked_per_system() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        parser.push_bytes(&ping_frame(&d, 0, 1));
        parser.push_bytes(&ping_frame(&d, 0, 2));
        parser.push_bytes(&ping_frame(&d, 1, 1));
        parser.push_bytes(&ping_frame(&d, 1, 2));
        let stats = parser.loss_stats();
        assert_eq!(stats.lost, 0);
        assert_eq!(stats.received, 4);
    }

    #[test]
    fn version_switch_follows_sender() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        assert_eq!(parser.protocol_version(), MavlinkVersion::V10);
        let mut values = HashMap::new();
        values.insert("value".to_string(), Value::U32(1));
        let legacy =
            encode(&d, MavlinkVersion::V09, 0, 1, 1, 0, &values).expect("encode");
        let events = parser.push_bytes(&legacy);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ParserEvent::Message(m) => {
                assert!(m.crc_ok);
                assert_eq!(m.version, MavlinkVersion::V09);
            }
            other => panic!("expected message, got {:?}", other),
        }
        assert_eq!(parser.protocol_version(), MavlinkVersion::V09);
        // And back.
        parser.push_bytes(&ping_frame(&d, 1, 1));
        assert_eq!(parser.protocol_version(), MavlinkVersion::V10);
    }

    #[test]
    fn short_payload_zero_extends() {
        let d = dialect();
        let msg = d.message_by_id(5).expect("message");
        // Frame claiming a 4-byte payload for an 8-byte message.
        let mut frame = vec![MAV_STX_V10, 4, 0, 1, 1, 5, 0x2a, 0, 0, 0];
        let crc = frame::frame_checksum(&frame[1..], msg.layout.crc_extra);
        frame.push((crc & 0xff) as u8);
        frame.push((crc >> 8) as u8);

        let mut parser = ParserState::new(d.clone());
        let events = parser.push_bytes(&frame);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ParserEvent::Message(m) => {
                assert!(m.crc_ok);
                assert_eq!(m.values.get("first").and_then(Value::as_u64), Some(0x2a));
                assert_eq!(m.values.get("second").and_then(Value::as_u64), Some(0));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn needed_bytes_hint() {
        let d = dialect();
        let mut parser = ParserState::new(d.clone());
        assert_eq!(parser.needed_bytes(), 1);
        let frame = ping_frame(&d, 0, 1);
        parser.buf.extend_from_slice(&frame[..3]);
        assert_eq!(parser.needed_bytes(), 3);
        parser.buf.extend_from_slice(&frame[3..6]);
        // Header complete: 4 payload + 2 crc outstanding.
        assert_eq!(parser.needed_bytes(), 6);
        parser.buf.clear();
        parser.buf.push(0x00);
        assert_eq!(parser.needed_bytes(), 0);
    }
}
