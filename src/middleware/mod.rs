//! Middleware layer.
//!
//! A [`Middleware`] turns one handler into another. It may run code before
//! and after the call to `next`, translate its result, or skip `next`
//! entirely (an auth check that fails, for instance). It calls `next` at most
//! once and hands back `next`'s error untouched unless translating errors is
//! its job.
//!
//! Middleware is composed once, when a route is registered. The list given to
//! [`AppBuilder::wrap`](crate::AppBuilder::wrap) is applied in order, first
//! entry outermost; route-specific layers sit inside it, closest to the
//! handler. For the built-ins the usual order is:
//!
//! ```text
//! Logger → Errors → Metrics → Panics → (route layers) → handler
//! ```
//!
//! - [`Panics`] turns a panic into an error so everything outside still runs.
//! - [`Metrics`] counts the request and, if it failed, the error.
//! - [`Errors`] renders the error as a JSON response.
//! - [`Logger`] sees the final status.

use std::sync::Arc;

use crate::handler::BoxedHandler;

mod errors;
mod logger;
mod metrics;
mod panics;

pub use self::errors::Errors;
pub use self::logger::Logger;
pub use self::metrics::Metrics;
pub use self::panics::Panics;

/// Wraps a handler with cross-cutting behaviour.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Any `Fn(BoxedHandler) -> BoxedHandler` is a middleware.
impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// Applies `layers` around `handler`, first layer outermost.
pub(crate) fn compose(handler: BoxedHandler, layers: &[Arc<dyn Middleware>]) -> BoxedHandler {
    layers.iter().rev().fold(handler, |next, mw| mw.wrap(next))
}
