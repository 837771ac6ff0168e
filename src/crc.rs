//! X25 CRC-16 (CRC-16/MCRF4XX), the checksum used both for the frame trailer
//! and for the per-message CRC-extra fingerprint.
//!
//! The accumulator must be bit-for-bit identical across independent MAVLink
//! implementations; it is the cornerstone of interoperability.

/// Running X25 CRC-16 accumulator, seeded to `0xFFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X25Crc {
    crc: u16,
}

impl X25Crc {
    pub fn new() -> Self {
        X25Crc { crc: 0xffff }
    }

    /// Fold one byte into the running checksum (table-free form).
    pub fn accumulate(&mut self, byte: u8) {
        let mut tmp = byte ^ (self.crc & 0xff) as u8;
        tmp ^= tmp << 4;
        self.crc = (self.crc >> 8) ^ ((tmp as u16) << 8) ^ ((tmp as u16) << 3) ^ ((tmp as u16) >> 4);
    }

    pub fn accumulate_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.accumulate(b);
        }
    }

    pub fn accumulate_str(&mut self, s: &str) {
        self.accumulate_slice(s.as_bytes());
    }

    pub fn value(&self) -> u16 {
        self.crc
    }
}

impl Default for X25Crc {
    fn default() -> Self {
        Self::new()
    }
}
