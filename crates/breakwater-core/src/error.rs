//! Error types surfaced to the connection driver.

use std::fmt;

use serde_json::json;

use crate::response::{Response, StatusCode};

/// An error that maps to an HTTP error response.
///
/// Handlers and pipeline steps fail with this type; the connection driver
/// converts it into a canned JSON error response. Protocol-level failures
/// (parse errors, limit trips) are mapped into it by the driver itself.
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    detail: String,
}

impl HttpError {
    /// Create an error with an explicit status and detail message.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// `400 Bad Request` — the client sent an unparseable request.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "The request could not be parsed")
    }

    /// `413 Payload Too Large` — a configured size limit was exceeded.
    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "The request exceeds a configured size limit",
        )
    }

    /// `404 Not Found` — no registered route matched the path.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "The requested resource was not found",
        )
    }

    /// `405 Method Not Allowed` — the method is not recognized or not
    /// registered for this path.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "The method is not allowed for this resource",
        )
    }

    /// `500 Internal Server Error` — a handler or pipeline step failed.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred",
        )
    }

    /// Replace the detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The detail message.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Build the canned JSON error response for this error.
    ///
    /// Client protocol and limit errors (4xx below routing) carry the
    /// numeric code; routing and server errors carry the detail message.
    #[must_use]
    pub fn canned_response(&self) -> Response {
        let code = self.status.as_u16();
        let reason = self.status.canonical_reason();
        let body = match code {
            400 | 413 => json!({ "error": reason, "code": code }),
            _ => json!({ "error": reason, "message": self.detail }),
        };
        let mut response = Response::with_status(self.status);
        response.set_json_body(body.to_string());
        response
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.status.as_u16(),
            self.status.canonical_reason(),
            self.detail
        )
    }
}

impl std::error::Error for HttpError {}
