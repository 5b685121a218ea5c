//! Per-request context.

use std::collections::HashMap;

use serde::Serialize;

use crate::request::Request;
use crate::response::{Response, StatusCode};

/// Scratchpad bridging one parsed request and its in-progress response.
///
/// A context is created immediately before routing and dropped immediately
/// after the handler returns, whatever the outcome. It owns everything it
/// holds: the parsed [`Request`], the [`Response`] under construction, the
/// decoded route parameters, and an opaque string-to-string state map that
/// pipeline steps and handlers use to talk to each other.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    params: HashMap<String, String>,
    state: HashMap<String, String>,
}

impl Context {
    /// Create a context for a freshly parsed request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
            params: HashMap::new(),
            state: HashMap::new(),
        }
    }

    /// The parsed request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response under construction.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable access to the response under construction.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Look up a decoded route parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Insert a route parameter. Called by the router during dispatch.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// All route parameters.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Look up an opaque state value by key.
    #[must_use]
    pub fn state(&self, key: &str) -> Option<&str> {
        self.state.get(key).map(String::as_str)
    }

    /// Set an opaque state value.
    pub fn set_state(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.insert(key.into(), value.into());
    }

    /// Set the response status.
    pub fn status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    /// Shortcut: set a JSON response body from raw bytes.
    pub fn json(&mut self, body: impl Into<Vec<u8>>) {
        self.response.set_json_body(body);
    }

    /// Shortcut: serialize a value as the JSON response body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails; the response is unchanged.
    pub fn json_value<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.response.set_json(value)
    }

    /// Shortcut: set an HTML response body.
    pub fn html(&mut self, body: impl Into<Vec<u8>>) {
        self.response.set_html_body(body);
    }

    /// Shortcut: set a plain-text response body.
    pub fn text(&mut self, body: impl Into<Vec<u8>>) {
        self.response.set_text_body(body);
    }

    /// Tear the context apart, keeping only the finished response.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;

    fn context() -> Context {
        Context::new(Request::new(Method::Get, "/hello"))
    }

    #[test]
    fn params_round_trip() {
        let mut ctx = context();
        ctx.set_param("id", "42");
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("missing"), None);
        assert_eq!(ctx.params().len(), 1);
    }

    #[test]
    fn state_is_an_opaque_scratchpad() {
        let mut ctx = context();
        ctx.set_state("auth.user", "alice");
        ctx.set_state("auth.user", "bob");
        assert_eq!(ctx.state("auth.user"), Some("bob"));
        assert_eq!(ctx.state("other"), None);
    }

    #[test]
    fn json_shortcut_sets_content_type_and_body() {
        let mut ctx = context();
        ctx.json("{\"ok\":true}");
        assert_eq!(ctx.response().body(), Some(&b"{\"ok\":true}"[..]));
        assert_eq!(
            ctx.response().header("Content-Type"),
            Some(&b"application/json"[..])
        );
    }

    #[test]
    fn status_shortcut_overwrites_default() {
        let mut ctx = context();
        ctx.status(StatusCode::CREATED);
        assert_eq!(ctx.response().status(), StatusCode::CREATED);
    }

    #[test]
    fn into_response_keeps_builder_contents() {
        let mut ctx = context();
        ctx.text("done");
        let response = ctx.into_response();
        assert_eq!(response.body(), Some(&b"done"[..]));
    }
}
