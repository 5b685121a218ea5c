//! HTTP response builder.

use serde::Serialize;

use crate::cookie::Cookie;

/// HTTP status code.
///
/// Only the codes the framework actually emits are enumerated with
/// constants; arbitrary codes can still be constructed via [`from_u16`].
///
/// [`from_u16`]: StatusCode::from_u16
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 100 Continue
    pub const CONTINUE: Self = Self(100);
    /// 101 Switching Protocols
    pub const SWITCHING_PROTOCOLS: Self = Self(101);
    /// 200 OK
    pub const OK: Self = Self(200);
    /// 201 Created
    pub const CREATED: Self = Self(201);
    /// 202 Accepted
    pub const ACCEPTED: Self = Self(202);
    /// 204 No Content
    pub const NO_CONTENT: Self = Self(204);
    /// 301 Moved Permanently
    pub const MOVED_PERMANENTLY: Self = Self(301);
    /// 302 Found
    pub const FOUND: Self = Self(302);
    /// 304 Not Modified
    pub const NOT_MODIFIED: Self = Self(304);
    /// 400 Bad Request
    pub const BAD_REQUEST: Self = Self(400);
    /// 401 Unauthorized
    pub const UNAUTHORIZED: Self = Self(401);
    /// 403 Forbidden
    pub const FORBIDDEN: Self = Self(403);
    /// 404 Not Found
    pub const NOT_FOUND: Self = Self(404);
    /// 405 Method Not Allowed
    pub const METHOD_NOT_ALLOWED: Self = Self(405);
    /// 409 Conflict
    pub const CONFLICT: Self = Self(409);
    /// 413 Payload Too Large
    pub const PAYLOAD_TOO_LARGE: Self = Self(413);
    /// 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    /// 501 Not Implemented
    pub const NOT_IMPLEMENTED: Self = Self(501);
    /// 502 Bad Gateway
    pub const BAD_GATEWAY: Self = Self(502);
    /// 503 Service Unavailable
    pub const SERVICE_UNAVAILABLE: Self = Self(503);

    /// Create a status code from a u16.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Get the canonical reason phrase.
    #[must_use]
    pub const fn canonical_reason(self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            413 => "Payload Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

// ============================================================================
// Header Validation (CRLF Injection Prevention)
// ============================================================================

/// Check if a header name contains only valid HTTP token characters.
fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            matches!(b,
                b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
                b'0'..=b'9' | b'A'..=b'Z' | b'^' | b'_' | b'`' | b'a'..=b'z' | b'|' | b'~'
            )
        })
}

/// Strip CR, LF, and NUL from a header value so a caller-supplied value can
/// never inject additional header lines into the serialized response.
fn sanitize_header_value(value: Vec<u8>) -> Vec<u8> {
    value
        .into_iter()
        .filter(|&b| b != b'\r' && b != b'\n' && b != 0)
        .collect()
}

/// HTTP response under construction.
///
/// The response is a mutable builder until it is handed to the serializer,
/// which consumes it; a serialized response cannot be reused.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, Vec<u8>)>,
    cookies: Vec<Cookie>,
    body: Option<Vec<u8>>,
}

impl Response {
    /// Create an empty `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    /// Create an empty response with the given status.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        let mut response = Self::new();
        response.status = status;
        response
    }

    /// Overwrite the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Set a header, replacing any previous value under the exact same name.
    ///
    /// Replacement is case-sensitive: `Content-Type` and `content-type` are
    /// distinct entries. Invalid header names are silently dropped and
    /// CR/LF/NUL bytes are stripped from values, so handler input can never
    /// split the serialized header block.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        if !is_valid_header_name(&name) {
            return;
        }
        let value = sanitize_header_value(value.into());
        if let Some(entry) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    /// Set the body, replacing any previous content.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = Some(body.into());
    }

    /// Set a JSON body: `Content-Type: application/json` plus the bytes.
    pub fn set_json_body(&mut self, body: impl Into<Vec<u8>>) {
        self.set_header("Content-Type", &b"application/json"[..]);
        self.set_body(body);
    }

    /// Serialize a value to JSON and use it as the body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails; the response is unchanged.
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.set_json_body(bytes);
        Ok(())
    }

    /// Set an HTML body: `Content-Type: text/html` plus the bytes.
    pub fn set_html_body(&mut self, body: impl Into<Vec<u8>>) {
        self.set_header("Content-Type", &b"text/html"[..]);
        self.set_body(body);
    }

    /// Set a plain-text body: `Content-Type: text/plain` plus the bytes.
    pub fn set_text_body(&mut self, body: impl Into<Vec<u8>>) {
        self.set_header("Content-Type", &b"text/plain"[..]);
        self.set_body(body);
    }

    /// Append a cookie. Cookies are emitted in the order they were added.
    ///
    /// CR, LF, and NUL bytes are stripped from every textual cookie field,
    /// so a cookie can no more split the serialized header block than a
    /// value passed to [`set_header`](Self::set_header) can.
    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie.sanitized());
    }

    /// Get the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the explicit headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, Vec<u8>)] {
        &self.headers
    }

    /// Look up a header by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Returns true if a header with this name is set, ignoring case.
    ///
    /// The serializer uses this to decide whether a default header
    /// (`Server`, `Date`, `Connection`, `Content-Length`) was overridden.
    #[must_use]
    pub fn has_header_ignore_case(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Get the cookies in insertion order.
    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Get the body, if set.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Decompose into parts for serialization, consuming the builder.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, Vec<(String, Vec<u8>)>, Vec<Cookie>, Option<Vec<u8>>) {
        (self.status, self.headers, self.cookies, self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::SameSite;

    // ========================================================================
    // StatusCode Tests
    // ========================================================================

    #[test]
    fn canonical_reasons_for_supported_codes() {
        let cases = [
            (100, "Continue"),
            (101, "Switching Protocols"),
            (200, "OK"),
            (201, "Created"),
            (202, "Accepted"),
            (204, "No Content"),
            (301, "Moved Permanently"),
            (302, "Found"),
            (304, "Not Modified"),
            (400, "Bad Request"),
            (401, "Unauthorized"),
            (403, "Forbidden"),
            (404, "Not Found"),
            (405, "Method Not Allowed"),
            (409, "Conflict"),
            (413, "Payload Too Large"),
            (500, "Internal Server Error"),
            (501, "Not Implemented"),
            (502, "Bad Gateway"),
            (503, "Service Unavailable"),
        ];
        for (code, reason) in cases {
            assert_eq!(StatusCode::from_u16(code).canonical_reason(), reason);
        }
    }

    #[test]
    fn unknown_code_has_unknown_reason() {
        assert_eq!(StatusCode::from_u16(418).canonical_reason(), "Unknown");
    }

    // ========================================================================
    // Builder Tests
    // ========================================================================

    #[test]
    fn default_response_is_200_with_no_body() {
        let response = Response::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
        assert!(response.body().is_none());
    }

    #[test]
    fn set_header_replaces_exact_name() {
        let mut response = Response::new();
        response.set_header("X-Trace", b"one".to_vec());
        response.set_header("X-Trace", b"two".to_vec());

        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.header("X-Trace"), Some(&b"two"[..]));
    }

    #[test]
    fn set_header_replacement_is_case_sensitive() {
        let mut response = Response::new();
        response.set_header("X-Trace", b"one".to_vec());
        response.set_header("x-trace", b"two".to_vec());

        // Different casing creates a second entry rather than replacing.
        assert_eq!(response.headers().len(), 2);
        assert!(response.has_header_ignore_case("X-TRACE"));
    }

    #[test]
    fn invalid_header_name_is_dropped() {
        let mut response = Response::new();
        response.set_header("X-Bad\r\nInjected", b"v".to_vec());
        response.set_header("", b"v".to_vec());
        assert!(response.headers().is_empty());
    }

    #[test]
    fn header_value_crlf_is_stripped() {
        let mut response = Response::new();
        response.set_header("X-Value", b"a\r\nSet-Cookie: evil=1".to_vec());
        assert_eq!(
            response.header("X-Value"),
            Some(&b"aSet-Cookie: evil=1"[..])
        );
    }

    #[test]
    fn body_setters_replace_prior_content() {
        let mut response = Response::new();
        response.set_text_body("hello");
        response.set_json_body("{\"ok\":true}");

        assert_eq!(response.body(), Some(&b"{\"ok\":true}"[..]));
        assert_eq!(
            response.header("Content-Type"),
            Some(&b"application/json"[..])
        );
        // Content-Type was replaced, not duplicated.
        assert_eq!(
            response
                .headers()
                .iter()
                .filter(|(n, _)| n == "Content-Type")
                .count(),
            1
        );
    }

    #[test]
    fn set_json_serializes_value() {
        #[derive(serde::Serialize)]
        struct Greeting {
            hello: &'static str,
        }

        let mut response = Response::new();
        response
            .set_json(&Greeting { hello: "world" })
            .expect("serialization succeeds");
        assert_eq!(response.body(), Some(&b"{\"hello\":\"world\"}"[..]));
    }

    #[test]
    fn html_body_sets_content_type() {
        let mut response = Response::new();
        response.set_html_body("<p>hi</p>");
        assert_eq!(response.header("Content-Type"), Some(&b"text/html"[..]));
    }

    #[test]
    fn set_cookie_strips_crlf_from_fields() {
        let mut response = Response::new();
        response.set_cookie(
            Cookie::new("x", "evil\r\nSet-Cookie: stolen=1").path("/\r\nX-Evil: 1"),
        );

        let cookie = &response.cookies()[0];
        assert_eq!(cookie.value(), "evilSet-Cookie: stolen=1");
        assert!(!cookie.to_header_value().contains('\r'));
        assert!(!cookie.to_header_value().contains('\n'));
    }

    #[test]
    fn cookies_preserve_insertion_order() {
        let mut response = Response::new();
        response.set_cookie(Cookie::new("b", "2"));
        response.set_cookie(Cookie::new("a", "1").same_site(SameSite::Lax));

        let names: Vec<_> = response.cookies().iter().map(Cookie::name).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn into_parts_consumes_builder() {
        let mut response = Response::with_status(StatusCode::CREATED);
        response.set_header("X-Id", b"7".to_vec());
        response.set_body("done");

        let (status, headers, cookies, body) = response.into_parts();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers.len(), 1);
        assert!(cookies.is_empty());
        assert_eq!(body, Some(b"done".to_vec()));
    }
}
