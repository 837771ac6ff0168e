//! Blocking connection wrapper: pairs a byte transport (`Read + Write`) with
//! a [`ParserState`] and the encoder, giving send/recv of whole messages.
//!
//! The transport is any stream of bytes; serial ports, TCP sockets and
//! in-memory test pipes all fit. The connection owns the parser state, its
//! own system/component ids, and the outgoing sequence counter.

use crate::frame::{self, EncodeError};
use crate::layout::CompiledDialect;
use crate::stream::{DecodedMessage, ParserEvent, ParserState};
use crate::value::Value;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

pub struct MavConnection<S> {
    stream: S,
    dialect: Arc<CompiledDialect>,
    state: ParserState,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    pending: VecDeque<ParserEvent>,
}

impl<S: Read + Write> MavConnection<S> {
    pub fn new(stream: S, dialect: Arc<CompiledDialect>, system_id: u8, component_id: u8) -> Self {
        MavConnection {
            stream,
            state: ParserState::new(dialect.clone()),
            dialect,
            system_id,
            component_id,
            sequence: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn parser(&self) -> &ParserState {
        &self.state
    }

    /// Encode and send one message; the sequence counter advances on every
    /// send, wrapping at 255.
    pub fn send(
        &mut self,
        name: &str,
        values: &HashMap<String, Value>,
    ) -> Result<(), ConnectionError> {
        let bytes = frame::encode_named(
            &self.dialect,
            self.state.protocol_version(),
            name,
            self.system_id,
            self.component_id,
            self.sequence,
            values,
        )?;
        self.sequence = self.sequence.wrapping_add(1);
        trace!(name, len = bytes.len(), "sending frame");
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Block until the transport yields one parser event, good or bad.
    pub fn recv_event(&mut self) -> Result<ParserEvent, ConnectionError> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Ok(ev);
            }
            let want = self.state.needed_bytes().max(1);
            let mut chunk = vec![0u8; want];
            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(ConnectionError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport closed",
                )));
            }
            self.pending.extend(self.state.push_bytes(&chunk[..n]));
        }
    }

    /// Block until a decoded message arrives, skipping discarded garbage.
    pub fn recv(&mut self) -> Result<DecodedMessage, ConnectionError> {
        loop {
            if let ParserEvent::Message(msg) = self.recv_event()? {
                return Ok(msg);
            }
        }
    }
}
