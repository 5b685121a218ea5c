//! TCP server and per-connection lifecycle driver.
//!
//! The server owns the accept loop and, per connection, an explicit state
//! machine:
//!
//! ```text
//! Reading ──headers seen──▶ HeadersComplete ──body satisfied──▶ Dispatching
//!    │                            │                                  │
//!    │◀────────rearm read─────────┘                                  ▼
//!    │                                                            Writing
//!    └──peer close / error / verdict──▶ Closing ◀───────────────────┘
//!                                          │
//!                                          ▼
//!                                        Closed
//! ```
//!
//! One connection serves exactly one request: parse, dispatch, respond,
//! close. The timeout engine is polled at every read-completion boundary
//! and any non-allowed verdict vetoes continuation. The admission permit is
//! released exactly once on the terminal path.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Instant;

use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::{TcpListener, TcpStream};
use asupersync::Cx;

use breakwater_core::{
    ConfigError, Context, Handler, HttpError, LogEntry, LogLevel, Logger, Method, Middleware,
    MiddlewareStack, PipelineFullError, Response, ServerConfig, StatusCode,
};
use breakwater_router::{RouteAddError, Router};

use crate::buffer::BufferPool;
use crate::parser::Parser;
use crate::pool::{ConnectionPermit, ConnectionPool};
use crate::timeout::{self, ConnectionTiming};
use crate::writer::ResponseWriter;

/// Slack on top of `max_body_size` before the driver stops reading and
/// responds 413 outright, covering the request line and headers.
pub const OVER_READ_SLACK: usize = 64 * 1024;

/// Server error.
#[derive(Debug)]
pub enum ServerError {
    /// IO error on bind or accept.
    Io(io::Error),
    /// Rejected configuration.
    Config(ConfigError),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    /// Awaiting more bytes of the request.
    Reading,
    /// End of headers seen; Content-Length known; body may still arrive.
    HeadersComplete,
    /// Full request present: parse, route, build the response. No I/O.
    Dispatching,
    /// Sending the serialized response.
    Writing,
    /// Releasing the slot and shutting the transport down.
    Closing,
    /// Terminal.
    Closed,
}

/// HTTP server: accept loop, admission control, and connection driving.
pub struct Server {
    config: Arc<ServerConfig>,
    router: Router,
    pipeline: MiddlewareStack,
    pool: Arc<ConnectionPool>,
    buffers: Arc<BufferPool>,
    logger: Logger,
    connection_seq: AtomicU64,
    epoch: Instant,
}

impl Server {
    /// Create a server from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration constraint the config violates.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let logger = Logger::new(config.log_level);
        let pool = ConnectionPool::new(config.max_connections);
        let buffers = BufferPool::new(config.buffer_size, config.max_buffers);
        let router = Router::new(config.max_routes, config.max_route_params);
        let pipeline = MiddlewareStack::new(config.max_middlewares);
        Ok(Self {
            config: Arc::new(config),
            router,
            pipeline,
            pool,
            buffers,
            logger,
            connection_seq: AtomicU64::new(0),
            epoch: Instant::now(),
        })
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The admission pool, for observation.
    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// The buffer pool, for observation.
    #[must_use]
    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    /// Register a route.
    ///
    /// # Errors
    ///
    /// Fails on the `max_routes` or `max_route_params` ceilings.
    pub fn route<H>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteAddError>
    where
        H: Handler + 'static,
    {
        self.router.add_route(method, pattern, handler)
    }

    /// Register a GET route.
    ///
    /// # Errors
    ///
    /// Fails on the registration ceilings, like [`route`](Self::route).
    pub fn get<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteAddError>
    where
        H: Handler + 'static,
    {
        self.route(Method::Get, pattern, handler)
    }

    /// Register a POST route.
    ///
    /// # Errors
    ///
    /// Fails on the registration ceilings.
    pub fn post<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteAddError>
    where
        H: Handler + 'static,
    {
        self.route(Method::Post, pattern, handler)
    }

    /// Register a PUT route.
    ///
    /// # Errors
    ///
    /// Fails on the registration ceilings.
    pub fn put<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteAddError>
    where
        H: Handler + 'static,
    {
        self.route(Method::Put, pattern, handler)
    }

    /// Register a DELETE route.
    ///
    /// # Errors
    ///
    /// Fails on the registration ceilings.
    pub fn delete<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteAddError>
    where
        H: Handler + 'static,
    {
        self.route(Method::Delete, pattern, handler)
    }

    /// Register a pipeline step.
    ///
    /// # Errors
    ///
    /// Fails on the `max_middlewares` ceiling.
    pub fn middleware<M: Middleware + 'static>(
        &mut self,
        step: M,
    ) -> Result<(), PipelineFullError> {
        self.pipeline.push(step)
    }

    /// Bind the configured address and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the listener breaks fatally.
    pub async fn listen(&self, cx: &Cx) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        self.logger.emit(
            &LogEntry::new(LogLevel::Info, "listening").field("addr", local_addr),
        );
        self.accept_loop(cx, listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// Useful for tests binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener breaks fatally.
    pub async fn serve_on(&self, cx: &Cx, listener: TcpListener) -> Result<(), ServerError> {
        self.accept_loop(cx, listener).await
    }

    async fn accept_loop(&self, cx: &Cx, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            if cx.is_cancel_requested() {
                self.logger.log(LogLevel::Info, "shutdown requested");
                return Ok(());
            }

            let (stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    if is_fatal_accept_error(&e) {
                        self.logger.log(LogLevel::Critical, format!("accept failed: {e}"));
                        return Err(ServerError::Io(e));
                    }
                    self.logger.log(LogLevel::Warning, format!("accept error: {e}"));
                    continue;
                }
            };

            // Admission: no slot, no connection object, no queueing.
            let Some(permit) = self.pool.try_acquire() else {
                self.logger.emit(
                    &LogEntry::new(LogLevel::Warning, "connection rejected at admission")
                        .field("peer", peer_addr)
                        .field("active", self.pool.active()),
                );
                drop(stream);
                continue;
            };

            let id = self.connection_seq.fetch_add(1, Ordering::Relaxed);
            self.logger.emit(
                &LogEntry::new(LogLevel::Debug, "connection accepted")
                    .connection(id)
                    .field("peer", peer_addr),
            );

            let mut connection = Connection::new(self, id, stream, permit);
            connection.run().await;
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("routes", &self.router.len())
            .finish_non_exhaustive()
    }
}

/// One connection's state machine instance.
///
/// Owned by the accept loop for the connection's whole lifetime; nothing
/// else touches it, so the timing facts need no locking.
struct Connection<'a> {
    server: &'a Server,
    id: u64,
    stream: TcpStream,
    permit: Option<ConnectionPermit>,
    timing: ConnectionTiming,
    buffer: Vec<u8>,
    headers_end: Option<usize>,
    response_bytes: Option<Vec<u8>>,
    state: ConnState,
}

impl<'a> Connection<'a> {
    fn new(server: &'a Server, id: u64, stream: TcpStream, permit: ConnectionPermit) -> Self {
        Self {
            server,
            id,
            stream,
            permit: Some(permit),
            timing: ConnectionTiming::new(server.now_ms()),
            buffer: Vec::with_capacity(server.config.buffer_size),
            headers_end: None,
            response_bytes: None,
            state: ConnState::Reading,
        }
    }

    /// Drive the state machine to `Closed`.
    async fn run(&mut self) {
        // The read scratch comes from the buffer pool when a slot is free;
        // a fresh allocation otherwise.
        let mut pooled = self.server.buffers.acquire();
        let mut fallback;
        let scratch: &mut [u8] = match pooled {
            Some(ref mut buf) => buf.as_mut_slice(),
            None => {
                fallback = vec![0u8; self.server.config.buffer_size];
                &mut fallback
            }
        };

        loop {
            self.state = match self.state {
                ConnState::Reading | ConnState::HeadersComplete => self.read_step(scratch).await,
                ConnState::Dispatching => self.dispatch_step(),
                ConnState::Writing => self.write_step().await,
                ConnState::Closing => self.close_step(),
                ConnState::Closed => break,
            };
        }
    }

    /// Await one read completion and fold its outcome into the machine.
    async fn read_step(&mut self, scratch: &mut [u8]) -> ConnState {
        match read_into_buffer(&mut self.stream, scratch).await {
            Err(e) => {
                self.log(LogLevel::Warning, format!("read error: {e}"));
                ConnState::Closing
            }
            Ok(0) => {
                self.log(LogLevel::Debug, "peer closed before request completed");
                ConnState::Closing
            }
            Ok(n) => {
                self.buffer.extend_from_slice(&scratch[..n]);
                let now = self.server.now_ms();
                self.timing.record_read(now);
                self.after_read(now)
            }
        }
    }

    /// Classify the accumulated bytes after a successful read.
    fn after_read(&mut self, now: u64) -> ConnState {
        let config = &self.server.config;

        // A client pushing far past the declared-body ceiling gets cut off
        // with 413 regardless of where its headers are.
        if self.buffer.len() > config.max_body_size + OVER_READ_SLACK {
            self.log(LogLevel::Warning, "over-read guard tripped");
            return self.respond_with(HttpError::payload_too_large());
        }

        if self.headers_end.is_none() {
            if let Some(pos) = find_header_end(&self.buffer) {
                self.headers_end = Some(pos);
                let expected =
                    timeout::parse_content_length(&self.buffer[..pos + 4]).unwrap_or(0);
                self.timing.mark_headers_complete(expected);
            } else if !timeout::validate_header_size(self.buffer.len(), config) {
                // Still no blank line and the header section alone already
                // exceeds its limit.
                self.log(LogLevel::Warning, "header section over limit");
                return self.respond_with(HttpError::payload_too_large());
            }
        }

        let next = match self.headers_end {
            Some(pos) => {
                let received = (self.buffer.len() - (pos + 4)) as u64;
                self.timing.set_received_body_length(received);
                if received >= self.timing.expected_body_length.unwrap_or(0) {
                    ConnState::Dispatching
                } else {
                    ConnState::HeadersComplete
                }
            }
            None => ConnState::Reading,
        };

        // Timeout checkpoint: polled at every read-completion boundary.
        let verdict = timeout::evaluate(&self.timing, config, now);
        if !verdict.is_allowed() {
            self.logger().emit(
                &LogEntry::new(LogLevel::Warning, "timing verdict closed connection")
                    .connection(self.id)
                    .field("verdict", verdict)
                    .field("received", self.timing.received_body_length),
            );
            return ConnState::Closing;
        }

        next
    }

    /// Parse, route, and serialize. This state never suspends on I/O.
    fn dispatch_step(&mut self) -> ConnState {
        let response = self.dispatch();
        self.response_bytes = Some(ResponseWriter::new().write(response));
        ConnState::Writing
    }

    fn dispatch(&mut self) -> Response {
        let parser = Parser::from_config(&self.server.config);
        let request = match parser.parse(&self.buffer) {
            Ok(request) => request,
            Err(e) => {
                self.log(LogLevel::Warning, format!("parse failed: {e}"));
                let err = if e.is_limit_error() {
                    HttpError::payload_too_large()
                } else {
                    HttpError::bad_request()
                };
                return err.canned_response();
            }
        };

        let mut ctx = Context::new(request);
        match self
            .server
            .router
            .handle_request(&mut ctx, &self.server.pipeline)
        {
            Ok(()) => ctx.into_response(),
            Err(err) => {
                let level = if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
                    LogLevel::Error
                } else {
                    LogLevel::Debug
                };
                self.log(level, format!("request failed: {err}"));
                err.canned_response()
            }
        }
    }

    /// Write the whole serialized response, then close.
    async fn write_step(&mut self) -> ConnState {
        let bytes = self.response_bytes.take().unwrap_or_default();
        match write_all(&mut self.stream, &bytes).await {
            Ok(()) => {
                self.logger().emit(
                    &LogEntry::new(LogLevel::Info, "response written")
                        .connection(self.id)
                        .field("bytes", bytes.len()),
                );
            }
            Err(e) => {
                self.log(LogLevel::Warning, format!("write error: {e}"));
            }
        }
        ConnState::Closing
    }

    /// Release the admission slot (exactly once) and finish.
    fn close_step(&mut self) -> ConnState {
        self.permit.take();
        self.log(LogLevel::Debug, "connection closed");
        ConnState::Closed
    }

    /// Build an error response and move to the write phase.
    fn respond_with(&mut self, err: HttpError) -> ConnState {
        self.response_bytes = Some(ResponseWriter::new().write(err.canned_response()));
        ConnState::Writing
    }

    fn logger(&self) -> &Logger {
        &self.server.logger
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.logger()
            .emit(&LogEntry::new(level, message).connection(self.id));
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Returns true if the accept error means the listener itself is broken.
fn is_fatal_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::InvalidInput
    )
}

/// Reads data from a TCP stream into a buffer.
///
/// Returns the number of bytes read, or 0 if the peer closed.
async fn read_into_buffer(stream: &mut TcpStream, buffer: &mut [u8]) -> io::Result<usize> {
    poll_fn(|cx| {
        let mut read_buf = ReadBuf::new(buffer);
        match Pin::new(&mut *stream).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    })
    .await
}

/// Writes all bytes to a stream, then flushes it.
///
/// Loops until the buffer is drained or the transport errors; a partial
/// write is never treated as completion.
async fn write_all(stream: &mut TcpStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = poll_fn(|cx| Pin::new(&mut *stream).poll_write(cx, buf)).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "failed to write whole response",
            ));
        }
        buf = &buf[n..];
    }
    poll_fn(|cx| Pin::new(&mut *stream).poll_flush(cx)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_rejects_invalid_config() {
        let err = Server::new(ServerConfig::default().with_port(0)).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort);
    }

    #[test]
    fn server_new_builds_pools_from_config() {
        let server = Server::new(
            ServerConfig::default()
                .with_max_connections(3)
                .with_port(8123),
        )
        .unwrap();
        assert_eq!(server.pool().max_connections(), 3);
        assert_eq!(server.buffers().slot_size(), 8192);
    }

    #[test]
    fn route_and_middleware_ceilings_come_from_config() {
        let mut config = ServerConfig::default();
        config.max_routes = 1;
        config.max_middlewares = 1;
        let mut server = Server::new(config).unwrap();

        fn ok(_ctx: &mut Context) -> Result<(), HttpError> {
            Ok(())
        }
        server.route(Method::Get, "/one", ok).unwrap();
        assert!(server.route(Method::Get, "/two", ok).is_err());

        struct Noop;
        impl Middleware for Noop {}
        server.middleware(Noop).unwrap();
        assert!(server.middleware(Noop).is_err());
    }

    #[test]
    fn dispatch_parser_inherits_validation_kill_switch() {
        // The driver hands its own config to the parser, so disabling
        // request validation reaches the dispatch path.
        let config = ServerConfig::default()
            .with_max_body_size(10)
            .with_request_validation(false);
        let parser = Parser::from_config(&config);
        let buffer = b"POST / HTTP/1.1\r\nContent-Length: 20\r\n\r\naaaaaaaaaaaaaaaaaaaa";
        assert!(parser.parse(buffer).is_ok());

        let parser = Parser::from_config(&ServerConfig::default().with_max_body_size(10));
        assert!(parser.parse(buffer).is_err());
    }

    #[test]
    fn fatal_accept_errors_are_classified() {
        assert!(is_fatal_accept_error(&io::Error::new(
            io::ErrorKind::NotConnected,
            "gone"
        )));
        assert!(!is_fatal_accept_error(&io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset"
        )));
    }
}
