//! Client protocol state machine
//!
//! Sans-I/O: bytes in, typed values out. Enforces strict request/response
//! alternation on one connection.
//!
//! ```text
//!          send(cmd)
//!   IDLE ─────────────▶ AWAIT_RESPONSE
//!    ▲                        │
//!    └────────────────────────┘
//!          receive(frame)
//! ```

use bytes::Bytes;

use crate::error::{DacError, Result};
use super::codec::{encode_command, Decoder, DecoderTable};
use super::{Command, CommandName, Frame, Response};

/// Whether a request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Idle,
    AwaitResponse,
}

/// The client-side LabVIEW server protocol state machine
#[derive(Debug)]
pub struct Lvs {
    state: ProtocolState,

    /// Decoder table built from configuration
    decoders: DecoderTable,

    /// Command awaiting a reply and its decoder
    pending: Option<(CommandName, Decoder)>,
}

impl Default for Lvs {
    fn default() -> Self {
        Self::new(DecoderTable::default())
    }
}

impl Lvs {
    pub fn new(decoders: DecoderTable) -> Self {
        Self {
            state: ProtocolState::Idle,
            decoders,
            pending: None,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Name of the command awaiting a reply, if any
    pub fn pending(&self) -> Option<CommandName> {
        self.pending.as_ref().map(|(name, _)| *name)
    }

    /// Record `command` as in flight and return the bytes to write
    pub fn send(&mut self, command: &Command) -> Result<Bytes> {
        if self.state != ProtocolState::Idle {
            return Err(DacError::ProtocolViolation(format!(
                "cannot send {} while {} is awaiting a response",
                command.name(),
                self.pending()
                    .map(|n| n.as_str())
                    .unwrap_or("another request")
            )));
        }

        let decoder = self.decoders.decoder_for(command.name());
        self.pending = Some((command.name(), decoder));
        self.state = ProtocolState::AwaitResponse;

        Ok(encode_command(command))
    }

    /// Accept the frame answering the in-flight command
    ///
    /// The state returns to idle even when decoding fails: the frame has
    /// been consumed and the exchange is over either way.
    pub fn receive(&mut self, frame: &Frame) -> Result<Response> {
        let (name, decoder) = match (self.state, self.pending.take()) {
            (ProtocolState::AwaitResponse, Some(pending)) => pending,
            _ => {
                return Err(DacError::ProtocolViolation(
                    "received a response with no request in flight".to_string(),
                ))
            }
        };
        self.state = ProtocolState::Idle;

        let payload = frame.payload();
        let data = decoder.decode(name, &payload)?;
        Ok(Response::new(name, payload, data))
    }

    /// Abandon any in-flight exchange
    ///
    /// Used when the connection is torn down; an incomplete exchange cannot
    /// be resumed on a new socket.
    pub fn reset(&mut self) {
        self.state = ProtocolState::Idle;
        self.pending = None;
    }
}
