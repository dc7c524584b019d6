//! Connection
//!
//! Owns one TCP socket to the command server and moves bytes over it.
//! Knows nothing about protocol state; see `Session` for that.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{DacError, Result};
use crate::protocol::{Frame, FrameAssembler};
use super::keepalive;

/// A live connection to the command server
pub struct Connection {
    /// TCP stream (unbuffered: every read is one bounded system call)
    stream: TcpStream,

    /// Scratch buffer sized to the per-read limit
    read_buf: Vec<u8>,

    /// Frame size limit
    max_frame_size: usize,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Connect to `host:port` and configure the socket
    ///
    /// Keepalive and timeouts are applied before the socket is handed out.
    pub fn open(host: &str, port: u16, config: &Config) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| DacError::connection("resolving server address", e))?
            .collect();
        if addrs.is_empty() {
            tracing::debug!("{}:{} did not resolve to any address", host, port);
        }
        Self::connect(&addrs, config)
    }

    /// Connect to the first reachable address and configure the socket
    ///
    /// An empty address list fails like an unreachable server.
    pub fn connect(addrs: &[SocketAddr], config: &Config) -> Result<Self> {
        let stream = Self::connect_any(addrs, config.connect_timeout_ms)?;
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .map_err(|e| DacError::connection("reading peer address", e))?;

        // Requests are tiny and latency-bound
        stream
            .set_nodelay(true)
            .map_err(|e| DacError::connection("configuring socket", e))?;
        keepalive::apply(&stream, &config.keepalive)
            .map_err(|e| DacError::connection("configuring keepalive", e))?;

        let mut connection = Self {
            stream,
            read_buf: vec![0u8; config.read_chunk_size.max(1)],
            max_frame_size: config.max_frame_size,
            peer_addr,
        };
        connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;

        tracing::debug!("Connected to {}", connection.peer_addr);
        Ok(connection)
    }

    fn connect_any(addrs: &[SocketAddr], timeout_ms: u64) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in addrs {
            let attempt = if timeout_ms > 0 {
                TcpStream::connect_timeout(addr, Duration::from_millis(timeout_ms))
            } else {
                TcpStream::connect(addr)
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(DacError::connection(
            "connecting",
            last_err.unwrap_or_else(|| ErrorKind::NotFound.into()),
        ))
    }

    /// Configure connection timeouts (0 leaves the operation unbounded)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        let write = (write_ms > 0).then(|| Duration::from_millis(write_ms));

        self.stream
            .set_read_timeout(read)
            .map_err(|e| DacError::connection("configuring socket", e))?;
        self.stream
            .set_write_timeout(write)
            .map_err(|e| DacError::connection("configuring socket", e))?;
        Ok(())
    }

    /// Write an encoded request in full
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        tracing::trace!("-> {}: {:?}", self.peer_addr, String::from_utf8_lossy(bytes));
        self.stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush())
            .map_err(|e| DacError::connection("writing request", e))
    }

    /// One read system call, at most `read_chunk_size` bytes
    ///
    /// An empty chunk means the peer closed the connection.
    pub fn read_chunk(&mut self) -> Result<Bytes> {
        loop {
            match self.stream.read(&mut self.read_buf) {
                Ok(n) => {
                    tracing::trace!("<- {}: {} bytes", self.peer_addr, n);
                    return Ok(Bytes::copy_from_slice(&self.read_buf[..n]));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DacError::connection("reading response", e)),
            }
        }
    }

    /// Read chunks until a complete frame has arrived
    pub fn read_frame(&mut self) -> Result<Frame> {
        let initial = self.read_chunk()?;
        FrameAssembler::new(self.max_frame_size).assemble(&initial, || self.read_chunk())
    }

    /// Close both directions; errors are irrelevant at this point
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// The underlying socket, for inspecting its options
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}
