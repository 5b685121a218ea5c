//! HTTP/1.1 request parser.
//!
//! The parser is total over arbitrary bytes: it is handed the accumulated
//! read buffer once the connection driver has already seen the end of the
//! header section, validates everything against the configured limits, and
//! either produces a fully owned [`Request`] or a classified [`ParseError`].
//! Nothing in the output borrows from the input buffer.
//!
//! Structural checks (line framing, the method literals, forbidden control
//! bytes, the fixed per-token caps below) are always enforced. The
//! config-driven size ceilings go through the [`timeout`] module's size
//! validators, so `enable_request_validation = false` switches them off.

use std::fmt;

use breakwater_core::{Method, Request, ServerConfig};

use crate::timeout;

/// Maximum accepted method token length in bytes.
pub const MAX_METHOD_LENGTH: usize = 16;

/// Maximum accepted version token length in bytes.
pub const MAX_VERSION_LENGTH: usize = 16;

/// Maximum accepted header name length in bytes.
pub const MAX_HEADER_NAME_SIZE: usize = 256;

/// Maximum accepted header value length in bytes.
pub const MAX_HEADER_VALUE_SIZE: usize = 4096;

/// Default maximum header count; configurable via `max_header_count`.
pub const MAX_HEADER_COUNT: usize = 100;

/// Classified request parsing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The accumulated request exceeds `max_request_size`.
    RequestTooLarge,
    /// The header section exceeds `max_header_size`.
    HeadersTooLarge,
    /// The declared body exceeds `max_body_size`.
    BodyTooLarge,
    /// No end-of-headers marker in the buffer.
    InvalidRequest,
    /// Malformed request line (token count, method, URI, or version).
    InvalidRequestLine,
    /// Malformed header line (missing colon, oversized, or forbidden bytes).
    InvalidHeaderLine,
    /// More headers than `max_header_count`.
    TooManyHeaders,
    /// Structurally valid but unrepresentable request (non-UTF-8 tokens).
    InvalidRequestFormat,
}

impl ParseError {
    /// True for the limit errors that map to `413` rather than `400`.
    #[must_use]
    pub fn is_limit_error(self) -> bool {
        matches!(
            self,
            Self::RequestTooLarge | Self::HeadersTooLarge | Self::BodyTooLarge
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestTooLarge => write!(f, "request too large"),
            Self::HeadersTooLarge => write!(f, "header section too large"),
            Self::BodyTooLarge => write!(f, "body too large"),
            Self::InvalidRequest => write!(f, "invalid request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeaderLine => write!(f, "invalid header line"),
            Self::TooManyHeaders => write!(f, "too many headers"),
            Self::InvalidRequestFormat => write!(f, "invalid request format"),
        }
    }
}

impl std::error::Error for ParseError {}

/// HTTP/1.1 request parser.
///
/// Carries the server configuration so its size checks honor both the
/// configured ceilings and the `enable_request_validation` kill switch.
pub struct Parser {
    config: ServerConfig,
}

impl Parser {
    /// Create a parser with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Create a parser bound to `config`.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Parse a request out of the accumulated buffer.
    ///
    /// The buffer must contain at least the complete header section; the
    /// body may be partial and is truncated to what has arrived.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ParseError`]; validation happens before any
    /// request storage is built, and everything allocated on the way to a
    /// failure is dropped with it.
    pub fn parse(&self, buffer: &[u8]) -> Result<Request, ParseError> {
        if !timeout::validate_request_size(buffer.len(), &self.config) {
            return Err(ParseError::RequestTooLarge);
        }

        let header_end = find_header_end(buffer).ok_or(ParseError::InvalidRequest)?;
        let header_section_len = header_end + 4;
        if !timeout::validate_header_size(header_section_len, &self.config) {
            return Err(ParseError::HeadersTooLarge);
        }

        let header_section = &buffer[..header_end];
        let line_end = header_section
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(header_section.len());

        let (method, path, query, version) =
            self.parse_request_line(&header_section[..line_end])?;

        let mut request = Request::with_version(method, path, version);
        request.set_query(query);

        let header_lines = if line_end + 2 <= header_section.len() {
            &header_section[line_end + 2..]
        } else {
            &[]
        };
        self.parse_header_lines(header_lines, &mut request)?;

        let body_bytes = &buffer[header_section_len..];
        request.set_body(self.extract_body(&request, body_bytes)?);

        Ok(request)
    }

    /// Split the request line on single spaces into exactly three tokens
    /// and validate each.
    fn parse_request_line(
        &self,
        line: &[u8],
    ) -> Result<(Method, String, Option<String>, String), ParseError> {
        let tokens: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
        if tokens.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }
        let (method_bytes, uri_bytes, version_bytes) = (tokens[0], tokens[1], tokens[2]);

        if method_bytes.is_empty() || method_bytes.len() > MAX_METHOD_LENGTH {
            return Err(ParseError::InvalidRequestLine);
        }
        let method = Method::from_bytes(method_bytes).ok_or(ParseError::InvalidRequestLine)?;

        if uri_bytes.is_empty()
            || !timeout::validate_uri_length(uri_bytes.len(), &self.config)
            || uri_bytes.contains(&0)
        {
            return Err(ParseError::InvalidRequestLine);
        }

        if version_bytes.is_empty()
            || version_bytes.len() > MAX_VERSION_LENGTH
            || !version_bytes.starts_with(b"HTTP/")
        {
            return Err(ParseError::InvalidRequestLine);
        }

        let uri = std::str::from_utf8(uri_bytes).map_err(|_| ParseError::InvalidRequestFormat)?;
        let version = std::str::from_utf8(version_bytes)
            .map_err(|_| ParseError::InvalidRequestFormat)?
            .to_string();

        let (path, query) = match uri.find('?') {
            Some(pos) => (uri[..pos].to_string(), Some(uri[pos + 1..].to_string())),
            None => (uri.to_string(), None),
        };
        if path.is_empty() {
            return Err(ParseError::InvalidRequestLine);
        }

        Ok((method, path, query, version))
    }

    /// Walk the header lines after the request line, stopping at the blank
    /// line. Duplicate names keep the last value.
    fn parse_header_lines(
        &self,
        mut remaining: &[u8],
        request: &mut Request,
    ) -> Result<(), ParseError> {
        let mut count = 0usize;
        while !remaining.is_empty() {
            let line_end = remaining
                .windows(2)
                .position(|w| w == b"\r\n")
                .unwrap_or(remaining.len());
            if line_end == 0 {
                break;
            }
            let line = &remaining[..line_end];
            remaining = if line_end + 2 <= remaining.len() {
                &remaining[line_end + 2..]
            } else {
                &[]
            };

            count += 1;
            if !timeout::validate_header_count(count, &self.config) {
                return Err(ParseError::TooManyHeaders);
            }

            let colon = line
                .iter()
                .position(|&b| b == b':')
                .ok_or(ParseError::InvalidHeaderLine)?;
            let name = trim_ascii_space(&line[..colon]);
            let value = trim_ascii_space(&line[colon + 1..]);

            if name.is_empty() || name.len() > MAX_HEADER_NAME_SIZE {
                return Err(ParseError::InvalidHeaderLine);
            }
            if value.len() > MAX_HEADER_VALUE_SIZE
                || value.iter().any(|&b| b == b'\r' || b == b'\n' || b == 0)
            {
                return Err(ParseError::InvalidHeaderLine);
            }

            let name =
                std::str::from_utf8(name).map_err(|_| ParseError::InvalidRequestFormat)?;
            request.headers_mut().insert(name, value.to_vec());
        }
        Ok(())
    }

    /// Compute the body from the Content-Length header, truncated to the
    /// bytes that have actually arrived.
    fn extract_body(
        &self,
        request: &Request,
        available: &[u8],
    ) -> Result<Option<Vec<u8>>, ParseError> {
        let declared = match request.headers().get_str("content-length") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(n) => n,
                // A malformed Content-Length is treated as absent.
                Err(_) => 0,
            },
            None => 0,
        };

        if declared == 0 {
            return Ok(None);
        }
        if !timeout::validate_body_size(declared, &self.config) {
            return Err(ParseError::BodyTooLarge);
        }

        let take = usize::try_from(declared)
            .unwrap_or(usize::MAX)
            .min(available.len());
        Ok(Some(available[..take].to_vec()))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

fn trim_ascii_space(mut bytes: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' '] = bytes {
        bytes = rest;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(buffer: &[u8]) -> Result<Request, ParseError> {
        Parser::new().parse(buffer)
    }

    fn parser_with(f: impl FnOnce(&mut ServerConfig)) -> Parser {
        let mut config = ServerConfig::default();
        f(&mut config);
        Parser::from_config(&config)
    }

    // ========================================================================
    // Request line
    // ========================================================================

    #[test]
    fn simple_get() {
        let request =
            parse(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n").unwrap();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/hello");
        assert_eq!(request.query(), None);
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.headers().get_str("Host"), Some("localhost"));
        assert_eq!(request.headers().get_str("User-Agent"), Some("test"));
        assert!(request.body().is_none());
    }

    #[test]
    fn query_is_split_but_not_decoded() {
        let request =
            parse(b"GET /search?q=zig&limit=10 HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
        assert_eq!(request.path(), "/search");
        assert_eq!(request.query(), Some("q=zig&limit=10"));
    }

    #[test]
    fn path_keeps_percent_encoding() {
        let request = parse(b"GET /files/foo%2Fbar.txt HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.path(), "/files/foo%2Fbar.txt");
    }

    #[test]
    fn all_nine_methods_accepted() {
        for method in [
            "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE", "CONNECT",
        ] {
            let buffer = format!("{method} / HTTP/1.1\r\n\r\n");
            assert!(parse(buffer.as_bytes()).is_ok(), "failed for {method}");
        }
    }

    #[test]
    fn unknown_method_rejected() {
        assert_eq!(
            parse(b"FETCH / HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
        assert_eq!(
            parse(b"get / HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
    }

    #[test]
    fn method_longer_than_sixteen_bytes_rejected() {
        let buffer = format!("{} / HTTP/1.1\r\n\r\n", "A".repeat(17));
        assert_eq!(
            parse(buffer.as_bytes()),
            Err(ParseError::InvalidRequestLine)
        );
    }

    #[test]
    fn wrong_token_count_rejected() {
        assert_eq!(parse(b"GET /\r\n\r\n"), Err(ParseError::InvalidRequestLine));
        assert_eq!(
            parse(b"GET / extra HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
        // A doubled space yields an empty token.
        assert_eq!(
            parse(b"GET  / HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
    }

    #[test]
    fn version_must_start_with_http_slash() {
        assert_eq!(
            parse(b"GET / SPDY/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
        assert!(parse(b"GET / HTTP/2.0\r\n\r\n").is_ok());
    }

    #[test]
    fn uri_with_nul_rejected() {
        assert_eq!(
            parse(b"GET /a\x00b HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
    }

    #[test]
    fn uri_over_limit_rejected() {
        let parser = parser_with(|c| c.max_uri_length = 10);
        let buffer = b"GET /aaaaaaaaaaaaaaa HTTP/1.1\r\n\r\n";
        assert_eq!(parser.parse(buffer), Err(ParseError::InvalidRequestLine));
    }

    #[test]
    fn missing_header_terminator_is_invalid_request() {
        assert_eq!(
            parse(b"GET / HTTP/1.1\r\nHost: x\r\n"),
            Err(ParseError::InvalidRequest)
        );
    }

    // ========================================================================
    // Headers
    // ========================================================================

    #[test]
    fn header_values_are_trimmed() {
        let request = parse(b"GET / HTTP/1.1\r\nHost:   spaced.example.com  \r\n\r\n").unwrap();
        assert_eq!(
            request.headers().get_str("host"),
            Some("spaced.example.com")
        );
    }

    #[test]
    fn header_without_colon_rejected() {
        assert_eq!(
            parse(b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n"),
            Err(ParseError::InvalidHeaderLine)
        );
    }

    #[test]
    fn empty_header_name_rejected() {
        assert_eq!(
            parse(b"GET / HTTP/1.1\r\n: value\r\n\r\n"),
            Err(ParseError::InvalidHeaderLine)
        );
    }

    #[test]
    fn oversized_header_name_rejected() {
        let buffer = format!("GET / HTTP/1.1\r\n{}: v\r\n\r\n", "H".repeat(257));
        assert_eq!(
            parse(buffer.as_bytes()),
            Err(ParseError::InvalidHeaderLine)
        );
    }

    #[test]
    fn oversized_header_value_rejected() {
        let buffer = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "v".repeat(4097));
        assert_eq!(
            parse(buffer.as_bytes()),
            Err(ParseError::InvalidHeaderLine)
        );
    }

    #[test]
    fn header_value_with_nul_rejected() {
        assert_eq!(
            parse(b"GET / HTTP/1.1\r\nX-Bad: a\x00b\r\n\r\n"),
            Err(ParseError::InvalidHeaderLine)
        );
    }

    #[test]
    fn too_many_headers_rejected() {
        let parser = parser_with(|c| c.max_header_count = 2);
        let buffer = b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n";
        assert_eq!(parser.parse(buffer), Err(ParseError::TooManyHeaders));
    }

    #[test]
    fn duplicate_header_last_wins() {
        let request = parse(b"GET / HTTP/1.1\r\nX-Id: 1\r\nX-Id: 2\r\n\r\n").unwrap();
        assert_eq!(request.headers().get_str("x-id"), Some("2"));
        assert_eq!(request.headers().len(), 1);
    }

    // ========================================================================
    // Body
    // ========================================================================

    #[test]
    fn post_with_json_body() {
        let request = parse(
            b"POST /api/users HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 25\r\n\r\n{\"name\":\"John\",\"age\":30}",
        )
        .unwrap();
        assert_eq!(request.method(), Method::Post);
        assert_eq!(
            request.headers().get_str("content-type"),
            Some("application/json")
        );
        assert_eq!(request.body(), Some(&br#"{"name":"John","age":30}"#[..]));
    }

    #[test]
    fn partial_body_is_truncated_to_available() {
        let request =
            parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").unwrap();
        assert_eq!(request.body(), Some(&b"abc"[..]));
    }

    #[test]
    fn zero_content_length_means_no_body() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert!(request.body().is_none());
    }

    #[test]
    fn absent_content_length_ignores_trailing_bytes() {
        let request = parse(b"GET / HTTP/1.1\r\n\r\ntrailing").unwrap();
        assert!(request.body().is_none());
    }

    #[test]
    fn malformed_content_length_treated_as_absent() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\nabc").unwrap();
        assert!(request.body().is_none());
    }

    #[test]
    fn declared_body_over_limit_rejected() {
        let parser = parser_with(|c| c.max_body_size = 10);
        let buffer = b"POST / HTTP/1.1\r\nContent-Length: 20\r\n\r\n";
        assert_eq!(parser.parse(buffer), Err(ParseError::BodyTooLarge));
    }

    #[test]
    fn content_length_lookup_is_case_insensitive() {
        let request =
            parse(b"POST / HTTP/1.1\r\ncontent-LENGTH: 2\r\n\r\nhi").unwrap();
        assert_eq!(request.body(), Some(&b"hi"[..]));
    }

    // ========================================================================
    // Size limits
    // ========================================================================

    #[test]
    fn oversized_total_request_rejected() {
        let parser = parser_with(|c| c.max_request_size = 16);
        let buffer = b"GET /aaaaaaaaaaaaaaaa HTTP/1.1\r\n\r\n";
        assert_eq!(parser.parse(buffer), Err(ParseError::RequestTooLarge));
    }

    #[test]
    fn oversized_header_section_rejected() {
        let parser = parser_with(|c| c.max_header_size = 32);
        let buffer = b"GET / HTTP/1.1\r\nX-Padding: aaaaaaaaaaaaaaaaaaaa\r\n\r\n";
        assert_eq!(parser.parse(buffer), Err(ParseError::HeadersTooLarge));
    }

    #[test]
    fn limit_errors_are_classified() {
        assert!(ParseError::BodyTooLarge.is_limit_error());
        assert!(ParseError::HeadersTooLarge.is_limit_error());
        assert!(ParseError::RequestTooLarge.is_limit_error());
        assert!(!ParseError::InvalidRequestLine.is_limit_error());
    }

    // ========================================================================
    // Validation kill switch
    // ========================================================================

    #[test]
    fn kill_switch_lifts_every_config_ceiling() {
        let parser = parser_with(|c| {
            c.max_request_size = 16;
            c.max_header_size = 16;
            c.max_uri_length = 8;
            c.max_header_count = 1;
            c.max_body_size = 10;
            c.enable_request_validation = false;
        });
        // Over every configured ceiling at once; still parses.
        let buffer = b"POST /a/rather/long/target HTTP/1.1\r\nA: 1\r\nB: 2\r\nContent-Length: 20\r\n\r\naaaaaaaaaaaaaaaaaaaa";
        let request = parser.parse(buffer).unwrap();
        assert_eq!(request.path(), "/a/rather/long/target");
        assert_eq!(request.headers().len(), 3);
        assert_eq!(request.body(), Some(&b"aaaaaaaaaaaaaaaaaaaa"[..]));
    }

    #[test]
    fn kill_switch_keeps_structural_checks() {
        let parser = parser_with(|c| c.enable_request_validation = false);

        // Framing, method literals, and forbidden bytes are not validators.
        assert_eq!(
            parser.parse(b"FETCH / HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
        assert_eq!(
            parser.parse(b"GET /a\x00b HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        );
        assert_eq!(
            parser.parse(b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n"),
            Err(ParseError::InvalidHeaderLine)
        );

        let oversized_name = format!("GET / HTTP/1.1\r\n{}: v\r\n\r\n", "H".repeat(257));
        assert_eq!(
            parser.parse(oversized_name.as_bytes()),
            Err(ParseError::InvalidHeaderLine)
        );
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    #[test]
    fn parsed_request_outlives_the_wire_buffer() {
        let request = {
            let buffer =
                b"POST /p?q=1 HTTP/1.1\r\nHost: h\r\nContent-Length: 2\r\n\r\nok".to_vec();
            parse(&buffer).unwrap()
        };
        assert_eq!(request.path(), "/p");
        assert_eq!(request.query(), Some("q=1"));
        assert_eq!(request.body(), Some(&b"ok"[..]));
    }
}
