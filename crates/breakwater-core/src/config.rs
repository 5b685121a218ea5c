//! Server configuration.
//!
//! All numeric limits, timeouts, and feature flags live here. The config is
//! built with `with_*` setters, validated once, and then held behind an
//! `Arc` by the server — it is never mutated after the server starts.

use std::fmt;

use crate::logging::LogLevel;

/// Default admission ceiling.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// Default per-connection read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind. Zero is invalid.
    pub port: u16,
    /// Interface address to bind.
    pub address: String,
    /// Admission ceiling: connections beyond this are dropped at accept.
    pub max_connections: usize,
    /// Transport read deadline in milliseconds.
    pub read_timeout_ms: u64,
    /// Transport write deadline in milliseconds.
    pub write_timeout_ms: u64,
    /// Reserved for keep-alive support; the server closes after one request.
    pub keepalive_timeout_ms: u64,
    /// Per-connection read buffer and buffer-pool slot size in bytes.
    pub buffer_size: usize,
    /// Buffer pool ceiling.
    pub max_buffers: usize,
    /// Route registration ceiling.
    pub max_routes: usize,
    /// Per-pattern parameter ceiling.
    pub max_route_params: usize,
    /// Middleware registration ceiling.
    pub max_middlewares: usize,
    /// Total connection lifetime bound in milliseconds (rule 1).
    pub connection_timeout_ms: u64,
    /// Per-request deadline; surfaced but not used by the verdict rules.
    pub request_timeout_ms: u64,
    /// Header-phase deadline in milliseconds (rule 3).
    pub header_timeout_ms: u64,
    /// Body-phase deadline in milliseconds (rule 4).
    pub body_timeout_ms: u64,
    /// Read-gap bound in milliseconds (rule 2).
    pub idle_timeout_ms: u64,
    /// Total request size validator bound in bytes.
    pub max_request_size: usize,
    /// Header count parser limit.
    pub max_header_count: usize,
    /// Header section size parser limit in bytes.
    pub max_header_size: usize,
    /// Request-target length parser limit in bytes.
    pub max_uri_length: usize,
    /// Declared body size parser limit in bytes.
    pub max_body_size: usize,
    /// Fraction of the declared body that must have arrived before the body
    /// deadline to avoid a Slowloris verdict (rule 4), in percent.
    pub body_read_threshold_percent: u64,
    /// Master switch for the size validators.
    pub enable_request_validation: bool,
    /// Master switch for the timeout verdict engine.
    pub enable_timeout_protection: bool,
    /// Future hook; the server emits `Connection: close` regardless.
    pub enable_keep_alive: bool,
    /// Future hook.
    pub enable_compression: bool,
    /// Future hook.
    pub enable_cors: bool,
    /// Minimum level emitted by the server's logger.
    pub log_level: LogLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            address: "127.0.0.1".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            keepalive_timeout_ms: 60_000,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_buffers: 200,
            max_routes: 100,
            max_route_params: 20,
            max_middlewares: 50,
            connection_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            header_timeout_ms: 10_000,
            body_timeout_ms: 60_000,
            idle_timeout_ms: 5_000,
            max_request_size: 1024 * 1024,
            max_header_count: 100,
            max_header_size: 8192,
            max_uri_length: 2048,
            max_body_size: 10 * 1024 * 1024,
            body_read_threshold_percent: 10,
            enable_request_validation: true,
            enable_timeout_protection: true,
            enable_keep_alive: false,
            enable_compression: false,
            enable_cors: false,
            log_level: LogLevel::Info,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The balanced default preset.
    #[must_use]
    pub fn basic() -> Self {
        Self::default()
    }

    /// Hardened preset: tight limits and short deadlines.
    #[must_use]
    pub fn secure() -> Self {
        Self {
            max_connections: 200,
            connection_timeout_ms: 10_000,
            header_timeout_ms: 3_000,
            body_timeout_ms: 15_000,
            idle_timeout_ms: 2_000,
            max_request_size: 256 * 1024,
            max_header_count: 50,
            max_header_size: 4096,
            max_uri_length: 1024,
            max_body_size: 1024 * 1024,
            body_read_threshold_percent: 25,
            log_level: LogLevel::Warning,
            ..Self::default()
        }
    }

    /// Development preset: generous deadlines and debug logging.
    #[must_use]
    pub fn dev() -> Self {
        Self {
            connection_timeout_ms: 300_000,
            header_timeout_ms: 60_000,
            body_timeout_ms: 300_000,
            idle_timeout_ms: 120_000,
            log_level: LogLevel::Debug,
            ..Self::default()
        }
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the bind port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the admission ceiling.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the declared-body parser limit.
    #[must_use]
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Set the header-section parser limit.
    #[must_use]
    pub fn with_max_header_size(mut self, bytes: usize) -> Self {
        self.max_header_size = bytes;
        self
    }

    /// Set the request-target parser limit.
    #[must_use]
    pub fn with_max_uri_length(mut self, bytes: usize) -> Self {
        self.max_uri_length = bytes;
        self
    }

    /// Set the idle-gap deadline.
    #[must_use]
    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    /// Set the whole-connection deadline.
    #[must_use]
    pub fn with_connection_timeout_ms(mut self, ms: u64) -> Self {
        self.connection_timeout_ms = ms;
        self
    }

    /// Enable or disable the timeout verdict engine.
    #[must_use]
    pub fn with_timeout_protection(mut self, enabled: bool) -> Self {
        self.enable_timeout_protection = enabled;
        self
    }

    /// Enable or disable the size validators.
    #[must_use]
    pub fn with_request_validation(mut self, enabled: bool) -> Self {
        self.enable_request_validation = enabled;
        self
    }

    /// Set the minimum log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: the port must be nonzero, all
    /// sizes and ceilings nonzero, the progress threshold within 1..=100,
    /// and every deadline nonzero while timeout protection is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.address.is_empty() {
            return Err(ConfigError::InvalidAddress);
        }
        for (name, value) in [
            ("max_connections", self.max_connections),
            ("buffer_size", self.buffer_size),
            ("max_buffers", self.max_buffers),
            ("max_routes", self.max_routes),
            ("max_route_params", self.max_route_params),
            ("max_middlewares", self.max_middlewares),
            ("max_request_size", self.max_request_size),
            ("max_header_count", self.max_header_count),
            ("max_header_size", self.max_header_size),
            ("max_uri_length", self.max_uri_length),
            ("max_body_size", self.max_body_size),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit { name });
            }
        }
        if self.body_read_threshold_percent == 0 || self.body_read_threshold_percent > 100 {
            return Err(ConfigError::InvalidThreshold {
                value: self.body_read_threshold_percent,
            });
        }
        if self.enable_timeout_protection {
            for (name, value) in [
                ("connection_timeout_ms", self.connection_timeout_ms),
                ("header_timeout_ms", self.header_timeout_ms),
                ("body_timeout_ms", self.body_timeout_ms),
                ("idle_timeout_ms", self.idle_timeout_ms),
            ] {
                if value == 0 {
                    return Err(ConfigError::ZeroTimeout { name });
                }
            }
        }
        Ok(())
    }

    /// The `address:port` string the listener binds.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Port 0 is not a bindable choice for a server.
    InvalidPort,
    /// Empty bind address.
    InvalidAddress,
    /// A size or ceiling option was zero.
    ZeroLimit {
        /// Name of the offending option.
        name: &'static str,
    },
    /// A deadline was zero while timeout protection is enabled.
    ZeroTimeout {
        /// Name of the offending option.
        name: &'static str,
    },
    /// `body_read_threshold_percent` outside 1..=100.
    InvalidThreshold {
        /// The rejected value.
        value: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort => write!(f, "port must be nonzero"),
            Self::InvalidAddress => write!(f, "bind address must not be empty"),
            Self::ZeroLimit { name } => write!(f, "{name} must be nonzero"),
            Self::ZeroTimeout { name } => {
                write!(f, "{name} must be nonzero while timeout protection is on")
            }
            Self::InvalidThreshold { value } => {
                write!(f, "body_read_threshold_percent must be in 1..=100, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
