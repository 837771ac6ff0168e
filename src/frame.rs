//! Frame encoding: header layout, protocol version magics, and the trailer
//! checksum. The decoder side lives in [`crate::stream`], which wraps this
//! module's constants in a resynchronizing state machine.
//!
//! Wire format, both versions:
//!
//!   [magic][payload_len][seq][sysid][compid][msgid][payload...][crc_lo][crc_hi]
//!
//! The checksum is the X25 CRC over every byte after the magic, with the
//! message's CRC-extra byte accumulated last.

use crate::codec;
use crate::crc::X25Crc;
use crate::layout::{CompiledDialect, CompiledMessage};
use crate::value::Value;
use std::collections::HashMap;

/// Start-of-frame magic for the legacy 0.9 framing.
pub const MAV_STX_V09: u8 = 0x55;
/// Start-of-frame magic for the 1.0 framing.
pub const MAV_STX_V10: u8 = 0xFE;

/// Header length after the magic byte.
pub const HEADER_LEN: usize = 5;
/// Trailer checksum length.
pub const CRC_LEN: usize = 2;

/// Which framing generation a frame uses. The two differ only in magic; the
/// CRC-extra byte is applied identically in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MavlinkVersion {
    V09,
    V10,
}

impl MavlinkVersion {
    pub fn magic(self) -> u8 {
        match self {
            MavlinkVersion::V09 => MAV_STX_V09,
            MavlinkVersion::V10 => MAV_STX_V10,
        }
    }

    pub fn from_magic(byte: u8) -> Option<Self> {
        match byte {
            MAV_STX_V09 => Some(MavlinkVersion::V09),
            MAV_STX_V10 => Some(MavlinkVersion::V10),
            _ => None,
        }
    }
}

/// Decoded frame header (the five bytes after the magic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u8,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no message with id {0} in dialect")]
    UnknownMessageId(u8),
    #[error("no message named {0} in dialect")]
    UnknownMessage(String),
}

/// Encode a complete frame for the message with the given id.
pub fn encode(
    dialect: &CompiledDialect,
    version: MavlinkVersion,
    message_id: u8,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    values: &HashMap<String, Value>,
) -> Result<Vec<u8>, EncodeError> {
    let message = dialect
        .message_by_id(message_id)
        .ok_or(EncodeError::UnknownMessageId(message_id))?;
    Ok(encode_message(message, version, system_id, component_id, sequence, values))
}

/// Encode a complete frame for the message with the given name.
pub fn encode_named(
    dialect: &CompiledDialect,
    version: MavlinkVersion,
    name: &str,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    values: &HashMap<String, Value>,
) -> Result<Vec<u8>, EncodeError> {
    let message = dialect
        .message_by_name(name)
        .ok_or_else(|| EncodeError::UnknownMessage(name.to_string()))?;
    Ok(encode_message(message, version, system_id, component_id, sequence, values))
}

fn encode_message(
    message: &CompiledMessage,
    version: MavlinkVersion,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    values: &HashMap<String, Value>,
) -> Vec<u8> {
    let payload = codec::pack(message, values);
    let mut frame = Vec::with_capacity(1 + HEADER_LEN + payload.len() + CRC_LEN);
    frame.push(version.magic());
    frame.push(payload.len() as u8);
    frame.push(sequence);
    frame.push(system_id);
    frame.push(component_id);
    frame.push(message.id);
    frame.extend_from_slice(&payload);

    let mut crc = X25Crc::new();
    crc.accumulate_slice(&frame[1..]);
    crc.accumulate(message.layout.crc_extra);
    let checksum = crc.value();
    frame.push((checksum & 0xff) as u8);
    frame.push((checksum >> 8) as u8);
    frame
}

/// Compute the trailer checksum for a received frame body (everything after
/// the magic, excluding the trailer itself).
pub fn frame_checksum(body: &[u8], crc_extra: u8) -> u16 {
    let mut crc = X25Crc::new();
    crc.accumulate_slice(body);
    crc.accumulate(crc_extra);
    crc.value()
}
