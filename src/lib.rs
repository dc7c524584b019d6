//! # lvdac
//!
//! Client for the text command protocol of the LabVIEW beamline data
//! acquisition and controls server:
//! - Motors, analog/digital I/O and detector instruments behind one socket
//! - Terminator-based framing with array-shape headers
//! - Strict request/response alternation, enforced by a sans-I/O state machine
//! - Thread-safe session with lazy connect, keepalive and a read-only guard
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Callers (threads, PV bridge, CLI)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Client / Session::send(command)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Session                                  │
//! │        (exclusive lock, lazy connect, teardown)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     LVS     │          │ Connection  │
//!   │ state+codec │          │ TCP, reads  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Frame     │
//!                           │  Assembler  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DacError, Result};
pub use config::{Config, KeepaliveConfig};
pub use network::Session;
pub use client::{Client, Inventory, MotorReading};
pub use protocol::{Command, CommandName, Param, Response, ResponseData};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of lvdac
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
