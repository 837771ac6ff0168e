//! mavwire: a MAVLink dialect compiler and wire codec.
//!
//! Dialects are written in a small DSL, compiled into immutable message
//! layouts, and used to encode frames and parse byte streams:
//!
//! ```
//! use mavwire::{compile_source, ParserState, Value};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let dialect = Arc::new(compile_source(r#"
//!     message 0 HEARTBEAT {
//!         custom_mode: u32;
//!         system_status: u8;
//!     }
//! "#).unwrap());
//!
//! let mut values = HashMap::new();
//! values.insert("custom_mode".to_string(), Value::U32(7));
//! let frame = mavwire::encode_named(
//!     &dialect, mavwire::MavlinkVersion::V10, "HEARTBEAT", 1, 1, 0, &values,
//! ).unwrap();
//!
//! let mut parser = ParserState::new(dialect);
//! let events = parser.push_bytes(&frame);
//! assert_eq!(events.len(), 1);
//! ```

pub mod ast;
pub mod codec;
pub mod connection;
pub mod crc;
pub mod dump;
pub mod frame;
pub mod layout;
pub mod parser;
pub mod stream;
pub mod value;

pub use codec::{pack, unpack, unpack_zero_extended, CodecError};
pub use connection::{ConnectionError, MavConnection};
pub use crc::X25Crc;
pub use dump::dump_layouts;
pub use frame::{
    encode, encode_named, EncodeError, FrameHeader, MavlinkVersion, MAV_STX_V09, MAV_STX_V10,
};
pub use layout::{
    compile, compile_source, CompileError, CompiledDialect, CompiledMessage, WireLayout,
};
pub use parser::parse;
pub use stream::{
    BadData, BadDataReason, DecodedMessage, ParseStatus, ParserEvent, ParserState, SequenceStats,
};
pub use value::Value;
