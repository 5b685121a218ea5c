//! HTTP response serialization.

use std::time::{SystemTime, UNIX_EPOCH};

use breakwater_core::Response;

/// `Server` header value advertised when the handler did not set one.
pub const SERVER_TOKEN: &str = concat!("breakwater/", env!("CARGO_PKG_VERSION"));

/// Serializes responses into owned wire bytes.
///
/// Consumes the response builder; a serialized response cannot be reused.
/// Output layout: status line, defaulted headers (`Server`, `Date`,
/// `Connection: close` — each only when the handler did not set it),
/// explicit headers in insertion order, one `Set-Cookie` line per cookie,
/// defaulted `Content-Length`, blank line, body.
pub struct ResponseWriter;

impl ResponseWriter {
    /// Create a writer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Serialize `response` into wire bytes.
    #[must_use]
    pub fn write(&self, response: Response) -> Vec<u8> {
        self.write_at(response, unix_time_secs())
    }

    /// Serialize with an explicit `Date` timestamp (seconds since epoch).
    #[must_use]
    pub fn write_at(&self, response: Response, epoch_secs: u64) -> Vec<u8> {
        let has_server = response.has_header_ignore_case("Server");
        let has_date = response.has_header_ignore_case("Date");
        let has_connection = response.has_header_ignore_case("Connection");
        let has_content_length = response.has_header_ignore_case("Content-Length");

        let (status, headers, cookies, body) = response.into_parts();
        let body_len = body.as_ref().map_or(0, Vec::len);

        let mut out = Vec::with_capacity(256 + body_len);

        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(status.as_u16().to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(status.canonical_reason().as_bytes());
        out.extend_from_slice(b"\r\n");

        if !has_server {
            out.extend_from_slice(b"Server: ");
            out.extend_from_slice(SERVER_TOKEN.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        if !has_date {
            out.extend_from_slice(b"Date: ");
            out.extend_from_slice(epoch_secs.to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        if !has_connection {
            out.extend_from_slice(b"Connection: close\r\n");
        }

        for (name, value) in &headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }

        for cookie in &cookies {
            out.extend_from_slice(b"Set-Cookie: ");
            out.extend_from_slice(cookie.to_header_value().as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        if !has_content_length {
            out.extend_from_slice(b"Content-Length: ");
            out.extend_from_slice(body_len.to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
        if let Some(body) = body {
            out.extend_from_slice(&body);
        }

        out
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use breakwater_core::{Cookie, SameSite, StatusCode};

    fn write(response: Response) -> String {
        String::from_utf8(ResponseWriter::new().write_at(response, 1_700_000_000)).unwrap()
    }

    #[test]
    fn status_line_uses_canonical_reason() {
        let out = write(Response::with_status(StatusCode::NOT_FOUND));
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn default_headers_are_emitted() {
        let out = write(Response::new());
        assert!(out.contains(&format!("Server: {SERVER_TOKEN}\r\n")));
        assert!(out.contains("Date: 1700000000\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(out.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn explicit_headers_suppress_defaults() {
        let mut response = Response::new();
        response.set_header("Server", &b"custom/9"[..]);
        response.set_header("connection", &b"keep-alive"[..]);
        let out = write(response);

        assert!(out.contains("Server: custom/9\r\n"));
        assert!(!out.contains(SERVER_TOKEN));
        assert!(out.contains("connection: keep-alive\r\n"));
        assert!(!out.contains("Connection: close"));
    }

    #[test]
    fn explicit_content_length_is_not_overwritten() {
        let mut response = Response::new();
        response.set_header("Content-Length", &b"99"[..]);
        response.set_body("four");
        let out = write(response);

        assert!(out.contains("Content-Length: 99\r\n"));
        assert!(!out.contains("Content-Length: 4\r\n"));
    }

    #[test]
    fn body_follows_single_blank_line() {
        let mut response = Response::new();
        response.set_json_body("{\"ok\":true}");
        let out = write(response);

        assert!(out.contains("Content-Type: application/json\r\n"));
        assert!(out.ends_with("\r\n\r\n{\"ok\":true}"));
        assert!(out.contains("Content-Length: 11\r\n"));
        // Exactly one header/body separator.
        assert_eq!(out.matches("\r\n\r\n").count(), 1);
    }

    #[test]
    fn response_without_body_ends_with_blank_line() {
        let out = write(Response::new());
        assert!(out.ends_with("\r\n\r\n"));
        assert_eq!(out.matches("\r\n\r\n").count(), 1);
    }

    #[test]
    fn cookies_emit_one_set_cookie_line_each_in_order() {
        let mut response = Response::new();
        response.set_cookie(Cookie::new("first", "1"));
        response.set_cookie(
            Cookie::new("second", "2")
                .path("/")
                .secure(true)
                .same_site(SameSite::Lax),
        );
        let out = write(response);

        let first = out.find("Set-Cookie: first=1\r\n").unwrap();
        let second = out
            .find("Set-Cookie: second=2; Path=/; Secure; SameSite=Lax\r\n")
            .unwrap();
        assert!(first < second);
    }

    #[test]
    fn explicit_headers_keep_insertion_order() {
        let mut response = Response::new();
        response.set_header("X-First", &b"1"[..]);
        response.set_header("X-Second", &b"2"[..]);
        let out = write(response);
        assert!(out.find("X-First").unwrap() < out.find("X-Second").unwrap());
    }

    #[test]
    fn scenario_json_ok_shape() {
        let mut response = Response::new();
        response.set_json_body("{\"ok\":true}");
        let out = write(response);

        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Type: application/json"));
        assert!(out.ends_with("\r\n\r\n{\"ok\":true}"));
    }
}
