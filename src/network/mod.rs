//! Network Module
//!
//! TCP transport for the protocol.
//!
//! ## Architecture
//! - `Connection`: one socket, bounded reads, keepalive
//! - `Session`: lazy connect, exclusive exchanges, teardown on failure

mod connection;
mod keepalive;
mod session;

pub use connection::Connection;
pub use session::Session;
