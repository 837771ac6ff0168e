//! Payload codec: packs field values into the little-endian wire order of a
//! compiled message, and unpacks payloads back into named values.
//!
//! Packing is total: missing fields encode as zero, excess array elements are
//! dropped, short arrays are padded. Unpacking has a strict form used by the
//! public API and a zero-extending form used by the framing layer, which must
//! accept truncated payloads from peers that strip trailing zero bytes.

use crate::ast::{FieldDef, FieldType};
use crate::layout::CompiledMessage;
use crate::value::Value;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload truncated: need {needed} bytes, got {got}")]
    TruncatedPayload { needed: usize, got: usize },
}

/// Pack values into a wire-order payload of exactly `wire_length` bytes.
pub fn pack(message: &CompiledMessage, values: &HashMap<String, Value>) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.layout.wire_length);
    for field in message.wire_fields() {
        pack_field(&mut out, field, values.get(&field.name));
    }
    out
}

/// Unpack a payload, requiring it to carry the full wire length. Trailing
/// bytes beyond the wire length are ignored.
pub fn unpack(
    message: &CompiledMessage,
    payload: &[u8],
) -> Result<HashMap<String, Value>, CodecError> {
    if payload.len() < message.layout.wire_length {
        return Err(CodecError::TruncatedPayload {
            needed: message.layout.wire_length,
            got: payload.len(),
        });
    }
    Ok(unpack_exact(message, payload))
}

/// Unpack a possibly-truncated payload by zero-extending it to the wire
/// length first. Never fails; used when decoding received frames.
pub fn unpack_zero_extended(message: &CompiledMessage, payload: &[u8]) -> HashMap<String, Value> {
    if payload.len() >= message.layout.wire_length {
        return unpack_exact(message, payload);
    }
    let mut padded = payload.to_vec();
    padded.resize(message.layout.wire_length, 0);
    unpack_exact(message, &padded)
}

fn unpack_exact(message: &CompiledMessage, payload: &[u8]) -> HashMap<String, Value> {
    let mut values = HashMap::new();
    let mut offset = 0usize;
    for field in message.wire_fields() {
        let width = field.byte_width();
        let bytes = &payload[offset..offset + width];
        offset += width;
        // Const fields are framing ballast, not data.
        if field.constant.is_some() {
            continue;
        }
        values.insert(field.name.clone(), unpack_field(field, bytes));
    }
    values
}

fn pack_field(out: &mut Vec<u8>, field: &FieldDef, value: Option<&Value>) {
    if let Some(c) = field.constant {
        pack_scalar(out, field.ty, &Value::U64(c));
        return;
    }
    if field.is_array() {
        if field.ty == FieldType::Char {
            pack_char_array(out, field.array_len, value);
            return;
        }
        let empty: Vec<Value> = Vec::new();
        let elems = match value {
            Some(Value::List(items)) => items.as_slice(),
            _ => &empty,
        };
        for i in 0..field.array_len {
            match elems.get(i) {
                Some(v) => pack_scalar(out, field.ty, v),
                None => out.extend(std::iter::repeat(0).take(field.ty.wire_size())),
            }
        }
        return;
    }
    match value {
        Some(v) => pack_scalar(out, field.ty, v),
        None => out.extend(std::iter::repeat(0).take(field.ty.wire_size())),
    }
}

fn pack_char_array(out: &mut Vec<u8>, len: usize, value: Option<&Value>) {
    let mut bytes = match value {
        Some(Value::Str(s)) => s.as_bytes().to_vec(),
        _ => Vec::new(),
    };
    bytes.resize(len, 0);
    out.extend_from_slice(&bytes[..len]);
}

/// Mismatched value types encode as zero rather than failing; packing stays
/// total so the framing layer never has to report codec errors on send.
fn pack_scalar(out: &mut Vec<u8>, ty: FieldType, value: &Value) {
    match ty {
        FieldType::U8 | FieldType::Char => out.push(value.as_u64().unwrap_or(0) as u8),
        FieldType::I8 => out.push(value.as_i64().unwrap_or(0) as u8),
        FieldType::U16 => {
            let mut buf = [0u8; 2];
            LittleEndian::write_u16(&mut buf, value.as_u64().unwrap_or(0) as u16);
            out.extend_from_slice(&buf);
        }
        FieldType::I16 => {
            let mut buf = [0u8; 2];
            LittleEndian::write_i16(&mut buf, value.as_i64().unwrap_or(0) as i16);
            out.extend_from_slice(&buf);
        }
        FieldType::U32 => {
            let mut buf = [0u8; 4];
            LittleEndian::write_u32(&mut buf, value.as_u64().unwrap_or(0) as u32);
            out.extend_from_slice(&buf);
        }
        FieldType::I32 => {
            let mut buf = [0u8; 4];
            LittleEndian::write_i32(&mut buf, value.as_i64().unwrap_or(0) as i32);
            out.extend_from_slice(&buf);
        }
        FieldType::U64 => {
            let mut buf = [0u8; 8];
            LittleEndian::write_u64(&mut buf, value.as_u64().unwrap_or(0));
            out.extend_from_slice(&buf);
        }
        FieldType::I64 => {
            let mut buf = [0u8; 8];
            LittleEndian::write_i64(&mut buf, value.as_i64().unwrap_or(0));
            out.extend_from_slice(&buf);
        }
        FieldType::Float => {
            let mut buf = [0u8; 4];
            LittleEndian::write_f32(&mut buf, value.as_f32().unwrap_or(0.0));
            out.extend_from_slice(&buf);
        }
        FieldType::Double => {
            let mut buf = [0u8; 8];
            LittleEndian::write_f64(&mut buf, value.as_f64().unwrap_or(0.0));
            out.extend_from_slice(&buf);
        }
    }
}

fn unpack_field(field: &FieldDef, bytes: &[u8]) -> Value {
    if field.is_array() {
        if field.ty == FieldType::Char {
            // NUL-terminated within the fixed-length slot.
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            return Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned());
        }
        let width = field.ty.wire_size();
        let items = bytes
            .chunks_exact(width)
            .map(|chunk| unpack_scalar(field.ty, chunk))
            .collect();
        return Value::List(items);
    }
    unpack_scalar(field.ty, bytes)
}

fn unpack_scalar(ty: FieldType, bytes: &[u8]) -> Value {
    match ty {
        FieldType::U8 | FieldType::Char => Value::U8(bytes[0]),
        FieldType::I8 => Value::I8(bytes[0] as i8),
        FieldType::U16 => Value::U16(LittleEndian::read_u16(bytes)),
        FieldType::I16 => Value::I16(LittleEndian::read_i16(bytes)),
        FieldType::U32 => Value::U32(LittleEndian::read_u32(bytes)),
        FieldType::I32 => Value::I32(LittleEndian::read_i32(bytes)),
        FieldType::U64 => Value::U64(LittleEndian::read_u64(bytes)),
        FieldType::I64 => Value::I64(LittleEndian::read_i64(bytes)),
        FieldType::Float => Value::Float(LittleEndian::read_f32(bytes)),
        FieldType::Double => Value::Double(LittleEndian::read_f64(bytes)),
    }
}
