//! Human-readable dump of compiled layouts, for the `dump_dialect` tool and
//! for eyeballing what the layout compiler derived from a dialect.

use crate::layout::CompiledDialect;
use std::fmt::Write;

/// Render every message layout: id, name, wire length, CRC-extra, and the
/// wire-order field table with offsets.
pub fn dump_layouts(dialect: &CompiledDialect) -> String {
    let mut out = String::new();
    let mut messages: Vec<_> = dialect.messages().iter().collect();
    messages.sort_by_key(|m| m.id);

    for msg in messages {
        let _ = writeln!(
            out,
            "message {} {} (wire_length={}, crc_extra={})",
            msg.id, msg.name, msg.layout.wire_length, msg.layout.crc_extra
        );
        let mut offset = 0usize;
        for (wire_pos, &decl_idx) in msg.layout.inverse_map.iter().enumerate() {
            let f = &msg.fields[decl_idx];
            let array = if f.is_array() {
                format!("[{}]", f.array_len)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "  [{:2}] +{:<3} {}{} {} ({} bytes, decl #{})",
                wire_pos,
                offset,
                f.ty.c_name(),
                array,
                f.name,
                f.byte_width(),
                decl_idx
            );
            offset += f.byte_width();
        }
    }
    out
}
