//! Schema model for a MAVLink dialect: the raw declarations produced by the
//! parser, and the resolved field vocabulary (scalar types, wire widths,
//! C type names) the layout compiler works with.

/// A dialect as declared: messages and enums, unvalidated.
#[derive(Debug, Clone, Default)]
pub struct DialectDef {
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
}

/// One message declaration: numeric id, name, fields in declaration order.
#[derive(Debug, Clone)]
pub struct MessageDef {
    pub id: u8,
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

/// A field as declared in the dialect source. The type keyword is kept as
/// text here; the compiler resolves it (or rejects it) against [`FieldType`].
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub type_keyword: String,
    /// 0 = scalar, >0 = fixed-length array (char arrays are strings).
    pub array_len: usize,
    /// Documentation-only enum tag; not used by the codec.
    pub enum_name: Option<String>,
    /// `const` marker: encoded as this value, omitted from decoded output.
    pub constant: Option<u64>,
}

/// A named enumeration: descriptive metadata only.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub entries: Vec<EnumEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumEntry {
    pub name: String,
    pub value: i64,
}

/// The fixed scalar type enumeration of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Char,
}

impl FieldType {
    /// Resolve a DSL type keyword. Both the short spellings (`u8`, `float`)
    /// and the C spellings (`uint8_t`) are accepted.
    pub fn from_keyword(kw: &str) -> Option<Self> {
        Some(match kw {
            "u8" | "uint8_t" => FieldType::U8,
            "u16" | "uint16_t" => FieldType::U16,
            "u32" | "uint32_t" => FieldType::U32,
            "u64" | "uint64_t" => FieldType::U64,
            "i8" | "int8_t" => FieldType::I8,
            "i16" | "int16_t" => FieldType::I16,
            "i32" | "int32_t" => FieldType::I32,
            "i64" | "int64_t" => FieldType::I64,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "char" => FieldType::Char,
            _ => return None,
        })
    }

    /// Byte width of one element of this type on the wire.
    pub fn wire_size(self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 | FieldType::Char => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::Float => 4,
            FieldType::U64 | FieldType::I64 | FieldType::Double => 8,
        }
    }

    /// The C-style type name fed into the CRC-extra fingerprint. These exact
    /// strings are part of the cross-implementation contract.
    pub fn c_name(self) -> &'static str {
        match self {
            FieldType::U8 => "uint8_t",
            FieldType::U16 => "uint16_t",
            FieldType::U32 => "uint32_t",
            FieldType::U64 => "uint64_t",
            FieldType::I8 => "int8_t",
            FieldType::I16 => "int16_t",
            FieldType::I32 => "int32_t",
            FieldType::I64 => "int64_t",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Char => "char",
        }
    }
}

/// A field with its type resolved: what the compiled layout carries.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub array_len: usize,
    pub enum_name: Option<String>,
    pub constant: Option<u64>,
}

impl FieldDef {
    /// Total wire width: element width, times array length for arrays.
    pub fn byte_width(&self) -> usize {
        self.ty.wire_size() * self.array_len.max(1)
    }

    pub fn is_array(&self) -> bool {
        self.array_len > 0
    }
}
