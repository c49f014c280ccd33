//! Request and error counters.

use std::sync::Arc;

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxedHandler, from_fn};
use crate::metrics::{ERRORS, REQUESTS};
use crate::request::Request;

/// Counts every request, and every request whose inner chain failed, in the
/// app's [`MetricsSink`](crate::MetricsSink).
#[derive(Clone, Copy, Debug, Default)]
pub struct Metrics;

impl Middleware for Metrics {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        from_fn(move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                ctx.metrics().increment(REQUESTS);

                let result = next.call(ctx.clone(), req).await;
                if result.is_err() {
                    ctx.metrics().increment(ERRORS);
                }
                result
            }
        })
    }
}
