//! Asynchronous HTTP/1.1 server framework with slow-client protection.
//!
//! breakwater turns a stream of accepted TCP connections into validated,
//! dispatched request/response exchanges while defending against Slowloris
//! style resource exhaustion:
//!
//! - bounded, incremental request parsing driven by read readiness
//! - a per-connection progress/timeout state machine separating slow
//!   networks from slow-client attacks
//! - admission-controlled connection accounting under `max_connections`
//! - a path-pattern router with `:name` captures and `*` wildcards over
//!   percent-decoded segments
//!
//! # Quick Start
//!
//! ```ignore
//! use breakwater::prelude::*;
//!
//! let mut server = breakwater::create_server("127.0.0.1", 8080)?;
//! server.get("/hello", |ctx: &mut Context| {
//!     ctx.json("{\"ok\":true}");
//!     Ok(())
//! })?;
//!
//! // Drive with the asupersync runtime:
//! // rt.block_on(async { server.listen(&cx).await })
//! ```
//!
//! # Crate Structure
//!
//! - [`breakwater_core`] — core types (Request, Response, Context, config)
//! - [`breakwater_http`] — parser, serializer, timeout engine, server
//! - [`breakwater_router`] — pattern registry and matching

#![forbid(unsafe_code)]

// Re-export crates
pub use breakwater_core as core;
pub use breakwater_http as http;
pub use breakwater_router as router;

// Re-export commonly used types
pub use breakwater_core::{
    ConfigError, Context, Cookie, Handler, HttpError, LogEntry, LogLevel, Logger, Method,
    Middleware, MiddlewareStack, Request, Response, SameSite, ServerConfig, StatusCode,
};
pub use breakwater_http::{
    BufferPool, ConnectionPool, ConnectionTiming, ParseError, Parser, ResponseWriter, Server,
    ServerError, Verdict,
};
pub use breakwater_router::{RoutePattern, Router};

/// Create a server bound to `address:port` with default settings.
///
/// # Errors
///
/// Returns an error when the resulting configuration is invalid (port 0,
/// empty address).
pub fn create_server(address: impl Into<String>, port: u16) -> Result<Server, ConfigError> {
    create_server_with_config(
        ServerConfig::default()
            .with_address(address)
            .with_port(port),
    )
}

/// Create a server from an explicit configuration.
///
/// # Errors
///
/// Returns the first constraint the configuration violates.
pub fn create_server_with_config(config: ServerConfig) -> Result<Server, ConfigError> {
    Server::new(config)
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        create_server, create_server_with_config, ConfigError, Context, Cookie, Handler,
        HttpError, LogLevel, Method, Middleware, Response, SameSite, Server, ServerConfig,
        StatusCode,
    };
}
