//! Session
//!
//! Serializes every caller onto the single server connection.
//!
//! ## Concurrency Model
//! - One `Mutex` covers the whole exchange: encode, write, read until the
//!   frame completes, decode. Callers queue on it.
//! - The endpoint and the read-only flag live outside that lock so they can
//!   be changed while an exchange is running; they are only consulted when
//!   a connection is opened or a command is admitted.
//!
//! ## Failure Policy
//! Any connection-class error drops the socket and resets the protocol state
//! to idle. So does a malformed binary array, whose tail may still be in
//! flight. The next `send` reconnects lazily. Nothing is retried here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{DacError, Result};
use crate::protocol::{Command, DecoderTable, Lvs, ProtocolState, Response, ResponseFamily};
use super::Connection;

/// Where the next connection goes
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
}

/// State guarded by the exchange lock
struct Exchange {
    /// Live socket, if any
    connection: Option<Connection>,

    /// Protocol state for the current socket
    lvs: Lvs,
}

impl Exchange {
    fn teardown(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!("Dropping connection to {}", connection.peer_addr());
            connection.shutdown();
        }
        self.lvs.reset();
    }
}

/// A shared client session
///
/// `Session` is `Sync`; share it behind an `Arc` between threads.
pub struct Session {
    /// Socket and protocol settings (endpoint fields are ignored)
    config: Config,

    /// Target for the next connect
    endpoint: RwLock<Endpoint>,

    /// Reject mutating commands before any I/O
    read_only: AtomicBool,

    /// Serializes exchanges
    exchange: Mutex<Exchange>,
}

impl Session {
    /// Create a session; no connection is made until the first `send`
    pub fn new(config: Config) -> Self {
        let endpoint = Endpoint {
            host: config.host.clone(),
            port: config.port,
        };
        let lvs = Lvs::new(DecoderTable::from_config(&config));

        Self {
            read_only: AtomicBool::new(config.read_only),
            endpoint: RwLock::new(endpoint),
            exchange: Mutex::new(Exchange {
                connection: None,
                lvs,
            }),
            config,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Change the server host; applies from the next connection attempt
    pub fn set_server_address(&self, host: impl Into<String>) {
        let host = host.into();
        tracing::debug!("Server address set to {}", host);
        self.endpoint.write().host = host;
    }

    /// Change the server port; applies from the next connection attempt
    pub fn set_port(&self, port: u16) {
        tracing::debug!("Server port set to {}", port);
        self.endpoint.write().port = port;
    }

    /// Current `(host, port)` target
    pub fn server_address(&self) -> (String, u16) {
        let endpoint = self.endpoint.read();
        (endpoint.host.clone(), endpoint.port)
    }

    /// Enable or disable the read-only guard
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Whether a socket is currently open (waits for any running exchange)
    pub fn is_connected(&self) -> bool {
        self.exchange.lock().connection.is_some()
    }

    /// Protocol state (waits for any running exchange)
    pub fn state(&self) -> ProtocolState {
        self.exchange.lock().lvs.state()
    }

    // =========================================================================
    // Exchange
    // =========================================================================

    /// Send one command and wait for its reply
    ///
    /// Blocks while another caller's exchange is in progress.
    pub fn send(&self, command: &Command) -> Result<Response> {
        self.admit(command)?;
        let mut exchange = self.exchange.lock();
        self.run(&mut exchange, command)
    }

    /// Like `send`, but give up if the session stays busy for `wait`
    ///
    /// Giving up has no effect on the server: the exchange never started.
    pub fn send_timeout(&self, command: &Command, wait: Duration) -> Result<Response> {
        self.admit(command)?;
        let mut exchange = self.exchange.try_lock_for(wait).ok_or(DacError::SessionBusy)?;
        self.run(&mut exchange, command)
    }

    /// Drop the connection; the next `send` reconnects
    pub fn close(&self) {
        self.exchange.lock().teardown();
    }

    fn admit(&self, command: &Command) -> Result<()> {
        if command.name().is_mutating() && self.is_read_only() {
            tracing::debug!("Read-only guard rejected {}", command.name());
            return Err(DacError::PermissionDenied {
                command: command.name(),
            });
        }
        Ok(())
    }

    fn run(&self, exchange: &mut Exchange, command: &Command) -> Result<Response> {
        // The guard may have been switched on while we queued for the lock
        self.admit(command)?;
        let result = self.exchange_once(exchange, command);

        if let Err(ref e) = result {
            if e.is_connection_error() || desynced(command, e) {
                tracing::warn!("{} failed: {}", command.name(), e);
                exchange.teardown();
            }
        }
        result
    }

    fn exchange_once(&self, exchange: &mut Exchange, command: &Command) -> Result<Response> {
        if exchange.connection.is_none() {
            let Endpoint { host, port } = self.endpoint.read().clone();
            exchange.connection = Some(Connection::open(&host, port, &self.config)?);
            exchange.lvs.reset();
        }

        let request = exchange.lvs.send(command)?;
        let connection = exchange
            .connection
            .as_mut()
            .ok_or(DacError::ConnectionClosed)?;

        connection.write_all(&request)?;
        let frame = connection.read_frame()?;

        tracing::debug!("{} completed ({} bytes)", command.name(), frame.as_bytes().len());
        exchange.lvs.receive(&frame)
    }
}

/// A binary body can contain the terminator bytes, so a short binary frame
/// may leave the rest of the reply unread on the socket.
fn desynced(command: &Command, err: &DacError) -> bool {
    matches!(err, DacError::MalformedResponse { .. })
        && command.name().family() == ResponseFamily::BinaryArray
}
