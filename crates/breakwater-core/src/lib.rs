//! Core types for the breakwater HTTP framework.
//!
//! This crate provides the fundamental building blocks shared by the wire
//! layer and the router:
//!
//! - [`Request`], [`Response`], [`StatusCode`], [`Headers`], [`Method`]
//! - [`Cookie`] and [`SameSite`]
//! - The per-request [`Context`] scratchpad
//! - [`ServerConfig`] with every limit, deadline, and feature flag
//! - The [`urlenc`] percent codec
//! - Structured [`logging`]
//! - The [`middleware`] pipeline contract and [`HttpError`] taxonomy
//!
//! # Design Principles
//!
//! - Everything a request produces is owned; nothing borrows from the
//!   transport buffer once parsing returns
//! - Decoding is total: hostile bytes degrade, they never panic or fail
//! - Configuration is validated once and immutable afterwards

#![forbid(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod config;
mod context;
mod cookie;
mod error;
pub mod logging;
pub mod middleware;
mod request;
mod response;
pub mod urlenc;

pub use config::{ConfigError, ServerConfig, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CONNECTIONS};
pub use context::Context;
pub use cookie::{Cookie, SameSite};
pub use error::HttpError;
pub use logging::{LogEntry, LogLevel, Logger};
pub use middleware::{ControlFlow, Handler, Middleware, MiddlewareStack, PipelineFullError};
pub use request::{Headers, Method, Request};
pub use response::{Response, StatusCode};
