//! HTTP/1.1 wire layer and connection lifecycle engine.
//!
//! This crate turns accepted TCP connections into validated, dispatched
//! request/response exchanges while defending against slow-client resource
//! exhaustion:
//!
//! - [`Parser`] — bounded request parsing over the accumulated read buffer
//! - [`ResponseWriter`] — response serialization with defaulted headers
//! - [`timeout`] — per-connection timing facts and the verdict engine that
//!   tells slow networks apart from Slowloris-style attacks
//! - [`ConnectionPool`] — atomic admission control under `max_connections`
//! - [`BufferPool`] — bounded fixed-size buffer recycling
//! - [`Server`] — the accept loop and per-connection state machine wiring
//!   all of the above together
//!
//! # Example
//!
//! ```ignore
//! use breakwater_core::{Context, HttpError, Method, ServerConfig};
//! use breakwater_http::Server;
//!
//! let mut server = Server::new(ServerConfig::default())?;
//! server.route(Method::Get, "/hello", |ctx: &mut Context| {
//!     ctx.json("{\"ok\":true}");
//!     Ok(())
//! })?;
//! // asupersync runtime drives: server.listen(&cx).await
//! ```

#![forbid(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_lifetimes)]

mod buffer;
mod parser;
mod pool;
mod server;
pub mod timeout;
mod writer;

pub use buffer::{BufferPool, PooledBuffer};
pub use parser::{
    ParseError, Parser, MAX_HEADER_COUNT, MAX_HEADER_NAME_SIZE, MAX_HEADER_VALUE_SIZE,
    MAX_METHOD_LENGTH, MAX_VERSION_LENGTH,
};
pub use pool::{ConnectionPermit, ConnectionPool};
pub use server::{Server, ServerError, OVER_READ_SLACK};
pub use timeout::{
    evaluate, parse_content_length, validate_body_size, validate_header_count,
    validate_header_size, validate_request_size, validate_uri_length, ConnectionTiming, Verdict,
};
pub use writer::{ResponseWriter, SERVER_TOKEN};
