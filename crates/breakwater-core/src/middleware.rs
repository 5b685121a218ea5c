//! Middleware pipeline contract.
//!
//! A pipeline is an ordered list of steps wrapped around the route handler.
//! `before` hooks run strictly in registration order ahead of the handler;
//! `after` hooks run in reverse order behind it. A step short-circuits the
//! remainder by returning [`ControlFlow::Break`], and a failing step skips
//! everything after it — the failure is raised to the connection driver,
//! which maps it to an error response.
//!
//! Handlers and steps run between two I/O suspension points of the
//! connection driver and must not suspend themselves, so the whole pipeline
//! is synchronous. Each hook receives the [`Context`] exactly once per
//! request.

use std::sync::Arc;

use crate::context::Context;
use crate::error::HttpError;

/// Control flow decision from a `before` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Continue with the next step or the handler.
    Continue,
    /// Stop the pipeline; the response already set on the context is sent
    /// without invoking the remaining steps or the handler.
    Break,
}

/// A pipeline step.
///
/// Both hooks default to no-ops, so a step implements only what it needs.
pub trait Middleware: Send + Sync {
    /// Runs before the handler, in registration order.
    ///
    /// # Errors
    ///
    /// A failure skips the remaining steps and the handler; the driver maps
    /// it per the error taxonomy (typically `500`).
    fn before(&self, _ctx: &mut Context) -> Result<ControlFlow, HttpError> {
        Ok(ControlFlow::Continue)
    }

    /// Runs after the handler, in reverse registration order, for every
    /// step whose `before` hook ran.
    ///
    /// # Errors
    ///
    /// A failure replaces the response with the mapped error response.
    fn after(&self, _ctx: &mut Context) -> Result<(), HttpError> {
        Ok(())
    }

    /// Step name for logging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A route handler.
pub trait Handler: Send + Sync {
    /// Process the request in `ctx`, writing the response into it.
    ///
    /// # Errors
    ///
    /// Any failure surfaces to the driver as `500 Internal Server Error`
    /// unless the error itself carries another status.
    fn call(&self, ctx: &mut Context) -> Result<(), HttpError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> Result<(), HttpError> + Send + Sync,
{
    fn call(&self, ctx: &mut Context) -> Result<(), HttpError> {
        self(ctx)
    }
}

/// An ordered middleware pipeline.
pub struct MiddlewareStack {
    steps: Vec<Arc<dyn Middleware>>,
    max_steps: usize,
}

impl MiddlewareStack {
    /// Create an empty pipeline bounded at `max_steps` registrations.
    #[must_use]
    pub fn new(max_steps: usize) -> Self {
        Self {
            steps: Vec::new(),
            max_steps,
        }
    }

    /// Register a step at the end of the pipeline.
    ///
    /// # Errors
    ///
    /// Fails once the registration ceiling is reached.
    pub fn push<M: Middleware + 'static>(&mut self, step: M) -> Result<(), PipelineFullError> {
        if self.steps.len() >= self.max_steps {
            return Err(PipelineFullError {
                max_steps: self.max_steps,
            });
        }
        self.steps.push(Arc::new(step));
        Ok(())
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no steps are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the pipeline around `handler`.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step or the handler error.
    pub fn execute(&self, handler: &dyn Handler, ctx: &mut Context) -> Result<(), HttpError> {
        let mut ran = 0;
        let mut short_circuited = false;

        for step in &self.steps {
            ran += 1;
            match step.before(ctx)? {
                ControlFlow::Continue => {}
                ControlFlow::Break => {
                    short_circuited = true;
                    break;
                }
            }
        }

        if !short_circuited {
            handler.call(ctx)?;
        }

        for step in self.steps[..ran].iter().rev() {
            step.after(ctx)?;
        }

        Ok(())
    }
}

/// Error returned when the middleware registration ceiling is hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFullError {
    /// The configured ceiling.
    pub max_steps: usize,
}

impl std::fmt::Display for PipelineFullError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "middleware ceiling of {} reached", self.max_steps)
    }
}

impl std::error::Error for PipelineFullError {}
