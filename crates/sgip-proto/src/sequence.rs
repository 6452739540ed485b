//! Message sequence numbering
//!
//! Every outgoing Bind and Submit carries a three-part sequence:
//! node id, `MMDDHHmmss` timestamp and a process-wide counter.

use bytes::{Buf, BufMut};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use std::fmt;

use crate::config::IdentityConfig;

/// 96-bit sequence identifying one protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageSequence(pub [u32; 3]);

impl MessageSequence {
    /// Encoded size in bytes
    pub const LEN: usize = 12;

    pub fn new(node_id: u32, timestamp: u32, counter: u32) -> Self {
        Self([node_id, timestamp, counter])
    }

    pub fn node_id(&self) -> u32 {
        self.0[0]
    }

    pub fn timestamp(&self) -> u32 {
        self.0[1]
    }

    pub fn counter(&self) -> u32 {
        self.0[2]
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        for part in self.0 {
            buf.put_u32(part);
        }
    }

    /// Reads 12 bytes. Caller guarantees they are available.
    pub fn decode(buf: &mut impl Buf) -> Self {
        Self([buf.get_u32(), buf.get_u32(), buf.get_u32()])
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        for (chunk, part) in out.chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&part.to_be_bytes());
        }
        out
    }
}

/// Renders as 24 upper-case hex characters, the token returned to submitters.
impl fmt::Display for MessageSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}{:08X}{:08X}", self.0[0], self.0[1], self.0[2])
    }
}

/// Process-wide sequence source
#[derive(Debug)]
pub struct SequenceGenerator {
    node_id: u32,
    counter: Mutex<u32>,
}

impl SequenceGenerator {
    pub fn new(area_phone_no: u32, corp_id: u32) -> Self {
        Self {
            node_id: Self::node_id_for(area_phone_no, corp_id),
            counter: Mutex::new(0),
        }
    }

    pub fn from_identity(identity: &IdentityConfig) -> Self {
        Self::new(identity.area_phone_no, identity.corp_id)
    }

    /// `3_000_000_000 + area * 100_000 + corp`; one- and two-digit area codes
    /// are scaled by ten.
    pub fn node_id_for(area_phone_no: u32, corp_id: u32) -> u32 {
        let area = if area_phone_no < 100 {
            area_phone_no.wrapping_mul(10)
        } else {
            area_phone_no
        };
        3_000_000_000u32
            .wrapping_add(area.wrapping_mul(100_000))
            .wrapping_add(corp_id)
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn next(&self) -> MessageSequence {
        self.next_at(Local::now().naive_local())
    }

    pub fn next_at(&self, now: NaiveDateTime) -> MessageSequence {
        let counter = {
            let mut guard = self.counter.lock();
            let current = *guard;
            *guard = current.wrapping_add(1);
            current
        };
        MessageSequence::new(self.node_id, Self::timestamp(now), counter)
    }

    /// `MMDDHHmmss` read as a decimal integer
    fn timestamp(now: NaiveDateTime) -> u32 {
        now.month() * 100_000_000
            + now.day() * 1_000_000
            + now.hour() * 10_000
            + now.minute() * 100
            + now.second()
    }

    #[cfg(test)]
    fn with_counter(area_phone_no: u32, corp_id: u32, counter: u32) -> Self {
        Self {
            node_id: Self::node_id_for(area_phone_no, corp_id),
            counter: Mutex::new(counter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn at(month: u32, day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_node_id_normalizes_short_area_codes() {
        assert_eq!(SequenceGenerator::node_id_for(20, 12345), 3_020_012_345);
        assert_eq!(SequenceGenerator::node_id_for(2, 1), 3_002_000_001);
        assert_eq!(SequenceGenerator::node_id_for(755, 99999), 3_075_599_999);
    }

    #[test]
    fn test_timestamp_component() {
        let gen = SequenceGenerator::new(10, 1);
        let seq = gen.next_at(at(12, 31, 23, 59, 58));
        assert_eq!(seq.timestamp(), 1_231_235_958);
        let seq = gen.next_at(at(1, 2, 3, 4, 5));
        assert_eq!(seq.timestamp(), 102_030_405);
    }

    #[test]
    fn test_counter_starts_at_zero_and_increments() {
        let gen = SequenceGenerator::new(10, 1);
        assert_eq!(gen.next().counter(), 0);
        assert_eq!(gen.next().counter(), 1);
        assert_eq!(gen.next().counter(), 2);
    }

    #[test]
    fn test_counter_wraps() {
        let gen = SequenceGenerator::with_counter(10, 1, u32::MAX);
        assert_eq!(gen.next().counter(), u32::MAX);
        assert_eq!(gen.next().counter(), 0);
    }

    #[test]
    fn test_concurrent_counters_are_distinct() {
        let gen = Arc::new(SequenceGenerator::new(10, 1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || {
                    let counters: Vec<u32> = (0..500).map(|_| gen.next().counter()).collect();
                    counters
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let counters = handle.join().unwrap();
            // each thread observes its own calls in increasing order
            assert!(counters.windows(2).all(|w| w[0] < w[1]));
            for c in counters {
                assert!(seen.insert(c));
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_display_and_bytes() {
        let seq = MessageSequence::new(0xB2D05E00, 0x01, 0xABCDEF);
        assert_eq!(seq.to_string(), "B2D05E000000000100ABCDEF");
        assert_eq!(seq.to_string().len(), 24);

        let bytes = seq.to_bytes();
        let mut slice = &bytes[..];
        assert_eq!(MessageSequence::decode(&mut slice), seq);
    }
}
