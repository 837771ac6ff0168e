//! Layout compiler: turns a [`DialectDef`] into immutable per-message wire
//! layouts (field ordering, payload length, CRC-extra fingerprint) plus the
//! id/name lookup tables the codec and framing layers run on.
//!
//! The wire order sorts fields by element byte width descending (stable, so
//! fields of equal width keep declaration order). This exists purely to keep
//! natural alignment when a packed struct is mapped onto the payload; it has
//! no semantic effect. The CRC-extra byte fingerprints the message name and
//! the wire-order type/name list, and must be bit-exact with every other
//! implementation of the same dialect.

use crate::ast::{DialectDef, EnumDef, FieldDef, FieldType};
use crate::crc::X25Crc;
use std::collections::HashMap;

/// Protocol limit on the number of fields per message.
pub const MAX_FIELDS: usize = 64;

/// Protocol limit on payload length (a single length byte on the wire).
pub const MAX_PAYLOAD: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("duplicate message id {id}: {first} and {second}")]
    DuplicateMessageId { id: u8, first: String, second: String },
    #[error("message {message}: duplicate field name {field}")]
    DuplicateFieldName { message: String, field: String },
    #[error("enum {name}: duplicate entry {entry}")]
    DuplicateEnumEntry { name: String, entry: String },
    #[error("message {message}, field {field}: unsupported type {keyword}")]
    UnsupportedFieldType {
        message: String,
        field: String,
        keyword: String,
    },
    #[error("message {message}: {count} fields exceeds the protocol limit of 64")]
    TooManyFields { message: String, count: usize },
    #[error("message {message}: payload is {length} bytes (max 255)")]
    PayloadTooLarge { message: String, length: usize },
}

/// The derived wire layout of one message. Immutable once computed.
#[derive(Debug, Clone)]
pub struct WireLayout {
    /// Declaration index -> wire position.
    pub order_map: Vec<usize>,
    /// Wire position -> declaration index.
    pub inverse_map: Vec<usize>,
    /// Sum of all field widths; always <= [`MAX_PAYLOAD`].
    pub wire_length: usize,
    /// One-byte fingerprint of name + wire-order field list.
    pub crc_extra: u8,
}

/// A message with its resolved fields (declaration order) and layout.
#[derive(Debug, Clone)]
pub struct CompiledMessage {
    pub id: u8,
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub layout: WireLayout,
}

impl CompiledMessage {
    /// Field at a given wire position.
    pub fn wire_field(&self, wire_index: usize) -> &FieldDef {
        &self.fields[self.layout.inverse_map[wire_index]]
    }

    /// Fields in wire order.
    pub fn wire_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.layout.inverse_map.iter().map(move |&i| &self.fields[i])
    }
}

/// A compiled dialect: every message layout plus lookup tables. Read-only
/// after compilation; safe to share across connections and threads.
#[derive(Debug, Clone)]
pub struct CompiledDialect {
    messages: Vec<CompiledMessage>,
    by_id: Box<[Option<u16>]>,
    by_name: HashMap<String, u16>,
    enums: Vec<EnumDef>,
}

impl CompiledDialect {
    pub fn message_by_id(&self, id: u8) -> Option<&CompiledMessage> {
        self.by_id[id as usize].map(|i| &self.messages[i as usize])
    }

    pub fn message_by_name(&self, name: &str) -> Option<&CompiledMessage> {
        self.by_name.get(name).map(|&i| &self.messages[i as usize])
    }

    pub fn messages(&self) -> &[CompiledMessage] {
        &self.messages
    }

    pub fn enums(&self) -> &[EnumDef] {
        &self.enums
    }
}

/// Compile a dialect: validate structure, merge enums, compute layouts.
/// All errors are fatal; no partial dialect is produced.
pub fn compile(def: &DialectDef) -> Result<CompiledDialect, CompileError> {
    let enums = merge_enums(&def.enums)?;

    let mut messages: Vec<CompiledMessage> = Vec::with_capacity(def.messages.len());
    let mut by_id: Vec<Option<u16>> = vec![None; 256];
    let mut by_name: HashMap<String, u16> = HashMap::new();

    for msg in &def.messages {
        if let Some(prev) = by_id[msg.id as usize] {
            return Err(CompileError::DuplicateMessageId {
                id: msg.id,
                first: messages[prev as usize].name.clone(),
                second: msg.name.clone(),
            });
        }
        if msg.fields.len() > MAX_FIELDS {
            return Err(CompileError::TooManyFields {
                message: msg.name.clone(),
                count: msg.fields.len(),
            });
        }

        let mut fields: Vec<FieldDef> = Vec::with_capacity(msg.fields.len());
        let mut seen = HashMap::new();
        for decl in &msg.fields {
            if seen.insert(decl.name.clone(), ()).is_some() {
                return Err(CompileError::DuplicateFieldName {
                    message: msg.name.clone(),
                    field: decl.name.clone(),
                });
            }
            let ty = FieldType::from_keyword(&decl.type_keyword).ok_or_else(|| {
                CompileError::UnsupportedFieldType {
                    message: msg.name.clone(),
                    field: decl.name.clone(),
                    keyword: decl.type_keyword.clone(),
                }
            })?;
            fields.push(FieldDef {
                name: decl.name.clone(),
                ty,
                array_len: decl.array_len,
                enum_name: decl.enum_name.clone(),
                constant: decl.constant,
            });
        }

        let layout = compute_layout(&msg.name, &fields)?;
        let index = messages.len() as u16;
        by_id[msg.id as usize] = Some(index);
        by_name.insert(msg.name.clone(), index);
        messages.push(CompiledMessage {
            id: msg.id,
            name: msg.name.clone(),
            fields,
            layout,
        });
    }

    Ok(CompiledDialect {
        messages,
        by_id: by_id.into_boxed_slice(),
        by_name,
        enums,
    })
}

/// Parse then compile in one step.
pub fn compile_source(source: &str) -> Result<CompiledDialect, CompileError> {
    let def = crate::parser::parse(source).map_err(CompileError::Parse)?;
    compile(&def)
}

/// Merge enum fragments by name: entries concatenate in source order;
/// a duplicate entry name or value within a merged enum is a hard error.
fn merge_enums(enums: &[EnumDef]) -> Result<Vec<EnumDef>, CompileError> {
    let mut merged: Vec<EnumDef> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for e in enums {
        let slot = match index.get(&e.name) {
            Some(&i) => i,
            None => {
                index.insert(e.name.clone(), merged.len());
                merged.push(EnumDef {
                    name: e.name.clone(),
                    entries: Vec::new(),
                });
                merged.len() - 1
            }
        };
        for entry in &e.entries {
            let existing = &merged[slot].entries;
            if existing
                .iter()
                .any(|prev| prev.name == entry.name || prev.value == entry.value)
            {
                return Err(CompileError::DuplicateEnumEntry {
                    name: e.name.clone(),
                    entry: entry.name.clone(),
                });
            }
            merged[slot].entries.push(entry.clone());
        }
    }
    Ok(merged)
}

fn compute_layout(name: &str, fields: &[FieldDef]) -> Result<WireLayout, CompileError> {
    // inverse_map[w] = declaration index of the field at wire position w.
    // Stable sort keeps declaration order among fields of equal width.
    let mut inverse_map: Vec<usize> = (0..fields.len()).collect();
    inverse_map.sort_by_key(|&i| std::cmp::Reverse(fields[i].ty.wire_size()));

    let mut order_map = vec![0usize; fields.len()];
    for (wire_pos, &decl_idx) in inverse_map.iter().enumerate() {
        order_map[decl_idx] = wire_pos;
    }

    let wire_length: usize = fields.iter().map(FieldDef::byte_width).sum();
    if wire_length > MAX_PAYLOAD {
        return Err(CompileError::PayloadTooLarge {
            message: name.to_string(),
            length: wire_length,
        });
    }

    let mut crc = X25Crc::new();
    crc.accumulate_str(name);
    crc.accumulate(b' ');
    for &decl_idx in &inverse_map {
        let f = &fields[decl_idx];
        crc.accumulate_str(f.ty.c_name());
        crc.accumulate(b' ');
        crc.accumulate_str(&f.name);
        crc.accumulate(b' ');
        if f.is_array() {
            crc.accumulate(f.array_len as u8);
        }
    }
    let v = crc.value();
    let crc_extra = ((v & 0xff) ^ (v >> 8)) as u8;

    Ok(WireLayout {
        order_map,
        inverse_map,
        wire_length,
        crc_extra,
    })
}
