//! Configuration for lvdac
//!
//! Centralized configuration with sensible defaults. A `Config` is owned by
//! the `Session` it was given to; there is no process-wide state.

/// Default TCP port of the LabVIEW command server
pub const DEFAULT_PORT: u16 = 55000;

/// Main configuration for a lvdac session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Server host name or address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Socket Configuration
    // -------------------------------------------------------------------------
    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Timeout for each individual read (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// Upper bound on bytes requested per read system call
    pub read_chunk_size: usize,

    /// Largest frame accepted before the connection is abandoned
    pub max_frame_size: usize,

    /// TCP keepalive settings, applied before the first request
    pub keepalive: KeepaliveConfig,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Reject hardware-mutating commands before any network activity
    pub read_only: bool,

    /// Exact reply that marks a successful `StopMotor`
    pub stop_ok_phrase: String,

    /// Reply prefix that marks a finished move in `GetMotorStatus`
    pub motor_done_prefix: String,
}

/// TCP keepalive settings
///
/// Used to detect a silently dead peer (instrument PC rebooted, cable pulled)
/// on a connection that is otherwise idle between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Enable SO_KEEPALIVE at all
    pub enabled: bool,

    /// Seconds of idleness before the first probe
    pub idle_secs: u32,

    /// Seconds between unanswered probes
    pub interval_secs: u32,

    /// Unanswered probes before the connection is dropped
    pub probes: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_secs: 60,
            interval_secs: 10,
            probes: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            read_timeout_ms: 30_000,
            write_timeout_ms: 5000,
            read_chunk_size: 16 * 1024,       // 16 KB
            max_frame_size: 64 * 1024 * 1024, // 64 MB
            keepalive: KeepaliveConfig::default(),
            read_only: false,
            stop_ok_phrase: "OK!0".to_string(),
            motor_done_prefix: "Move finished".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `host:port` as used for resolution and logging
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per-read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the maximum bytes per read call
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size.max(1);
        self
    }

    /// Set the maximum accepted frame size (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the keepalive parameters
    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.config.keepalive = keepalive;
        self
    }

    /// Enable or disable the read-only guard
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the exact `StopMotor` success reply
    pub fn stop_ok_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.config.stop_ok_phrase = phrase.into();
        self
    }

    /// Set the `GetMotorStatus` finished-move prefix
    pub fn motor_done_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.motor_done_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
