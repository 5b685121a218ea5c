//! Path-pattern router.
//!
//! Routes are stored in registration order and matched first-match-wins:
//! a literal route registered after an overlapping `:param` route will never
//! be reached, so registrants order more specific patterns first. Patterns
//! are never rewritten after registration.
//!
//! # Pattern grammar
//!
//! Segments are separated by `/`:
//!
//! - a literal segment matches exactly (case-sensitive) against the decoded
//!   path segment
//! - `:name` matches any nonempty decoded segment and captures it
//! - `*` matches the current and all remaining segments
//!
//! # Example
//!
//! ```
//! use breakwater_core::{Context, Method, MiddlewareStack, Request};
//! use breakwater_router::Router;
//!
//! let mut router = Router::new(100, 20);
//! router
//!     .add_route(Method::Get, "/files/:filename", |ctx: &mut Context| {
//!         let name = ctx.param("filename").unwrap_or("").to_string();
//!         ctx.text(name);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let pipeline = MiddlewareStack::new(50);
//! let mut ctx = Context::new(Request::new(Method::Get, "/files/foo%2Fbar.txt"));
//! router.handle_request(&mut ctx, &pipeline).unwrap();
//! assert_eq!(ctx.response().body(), Some(&b"foo/bar.txt"[..]));
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

mod pattern;

pub use pattern::{PatternSegment, RoutePattern};

use std::fmt;
use std::sync::Arc;

use breakwater_core::{Context, Handler, HttpError, Method, MiddlewareStack};

/// A registered route.
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// The route's method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The route's pattern.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// The route's handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Route registration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAddError {
    /// The `max_routes` ceiling was reached.
    TooManyRoutes {
        /// The configured ceiling.
        max_routes: usize,
    },
    /// The pattern declares more `:name` captures than `max_route_params`.
    TooManyParams {
        /// The configured ceiling.
        max_params: usize,
        /// Captures the pattern declares.
        declared: usize,
    },
}

impl fmt::Display for RouteAddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyRoutes { max_routes } => {
                write!(f, "route ceiling of {max_routes} reached")
            }
            Self::TooManyParams { max_params, declared } => {
                write!(f, "pattern declares {declared} params, ceiling is {max_params}")
            }
        }
    }
}

impl std::error::Error for RouteAddError {}

/// Insertion-ordered route registry with first-match lookup.
///
/// The route list is written only during setup and read-only while serving;
/// the server freezes it behind an `Arc` once `listen` begins.
pub struct Router {
    routes: Vec<Route>,
    max_routes: usize,
    max_route_params: usize,
}

impl Router {
    /// Create a router with the given registration ceilings.
    #[must_use]
    pub fn new(max_routes: usize, max_route_params: usize) -> Self {
        Self {
            routes: Vec::new(),
            max_routes,
            max_route_params,
        }
    }

    /// Register a route at the end of the list.
    ///
    /// # Errors
    ///
    /// Fails when the route ceiling is reached or the pattern declares more
    /// captures than allowed.
    pub fn add_route<H>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteAddError>
    where
        H: Handler + 'static,
    {
        if self.routes.len() >= self.max_routes {
            return Err(RouteAddError::TooManyRoutes {
                max_routes: self.max_routes,
            });
        }
        let pattern = RoutePattern::parse(pattern);
        let declared = pattern.param_count();
        if declared > self.max_route_params {
            return Err(RouteAddError::TooManyParams {
                max_params: self.max_route_params,
                declared,
            });
        }
        self.routes.push(Route {
            method,
            pattern,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first route whose method equals `method` and whose pattern
    /// matches `path`, in registration order.
    #[must_use]
    pub fn find_route(&self, method: Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == method && route.pattern.matches(path))
    }

    /// Returns true if any route matches the path under some other method.
    ///
    /// Used to distinguish `405 Method Not Allowed` from `404 Not Found`.
    #[must_use]
    pub fn path_known(&self, path: &str) -> bool {
        self.routes.iter().any(|route| route.pattern.matches(path))
    }

    /// Route the request in `ctx` and run its handler through `pipeline`.
    ///
    /// On a match, every `:name` capture is decoded into `ctx.params`
    /// before the pipeline runs.
    ///
    /// # Errors
    ///
    /// `404 Not Found` when nothing matches, `405 Method Not Allowed` when
    /// the path is served under a different method, and whatever a pipeline
    /// step or the handler raised otherwise.
    pub fn handle_request(
        &self,
        ctx: &mut Context,
        pipeline: &MiddlewareStack,
    ) -> Result<(), HttpError> {
        let method = ctx.request().method();
        let path = ctx.request().path().to_string();

        let Some(route) = self.find_route(method, &path) else {
            if self.path_known(&path) {
                return Err(HttpError::method_not_allowed());
            }
            return Err(HttpError::not_found());
        };

        for (name, value) in route.pattern.extract_params(&path) {
            ctx.set_param(name, value);
        }

        pipeline.execute(route.handler.as_ref(), ctx)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("max_routes", &self.max_routes)
            .finish_non_exhaustive()
    }
}
