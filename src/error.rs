//! Error types for lvdac
//!
//! Provides a unified error type for all operations. The kinds are kept
//! distinct so callers can tell "nothing reached the instrument, retry the
//! whole exchange" apart from "the instrument may already have acted".

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::CommandName;

/// Result type alias using DacError
pub type Result<T> = std::result::Result<T, DacError>;

/// Unified error type for lvdac operations
#[derive(Debug, Error)]
pub enum DacError {
    // -------------------------------------------------------------------------
    // Connection Errors (socket is torn down, next send reconnects)
    // -------------------------------------------------------------------------
    #[error("Connection error while {context}: {source}")]
    Connection {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Frame exceeded maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Malformed response to {command}: {reason} (payload: {payload:?})")]
    MalformedResponse {
        command: CommandName,
        reason: String,
        payload: Bytes,
    },

    // -------------------------------------------------------------------------
    // Guard / Argument Errors (raised before any I/O)
    // -------------------------------------------------------------------------
    #[error("Permission denied: {command} mutates hardware and the session is read-only")]
    PermissionDenied { command: CommandName },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Session busy: gave up waiting for exclusive access")]
    SessionBusy,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DacError {
    pub(crate) fn connection(context: &'static str, source: std::io::Error) -> Self {
        DacError::Connection { context, source }
    }

    pub(crate) fn malformed(command: CommandName, reason: impl Into<String>, payload: &[u8]) -> Self {
        DacError::MalformedResponse {
            command,
            reason: reason.into(),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// True for the failures that tear the socket down.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DacError::Connection { .. } | DacError::ConnectionClosed | DacError::FrameTooLarge { .. }
        )
    }

    /// Whether the whole exchange may be blindly retried.
    ///
    /// Connection failures are only retryable for commands that do not move
    /// hardware, since the request may have executed before the link died.
    /// Deterministic rejections (guard, bad arguments) never succeed on retry.
    pub fn is_retry_safe(&self, command: CommandName) -> bool {
        match self {
            DacError::SessionBusy => true,
            e if e.is_connection_error() => !command.is_mutating(),
            _ => false,
        }
    }
}
