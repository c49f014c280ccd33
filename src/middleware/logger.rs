//! Request logging.

use std::sync::Arc;

use tracing::info;

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxedHandler, from_fn};
use crate::request::Request;

/// Logs when a request starts and when it completes, with its status and
/// the time elapsed since it arrived. Never alters the result.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Middleware for Logger {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        from_fn(move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                let method = req.method();
                let path = req.path().to_owned();
                let remote_addr = req.remote_addr().map(|a| a.to_string());

                info!(
                    trace_id = ctx.values().trace_id(),
                    %method,
                    path = %path,
                    remote_addr = remote_addr.as_deref().unwrap_or("-"),
                    "request started"
                );

                let result = next.call(ctx.clone(), req).await;

                let values = ctx.values();
                info!(
                    trace_id = values.trace_id(),
                    %method,
                    path = %path,
                    remote_addr = remote_addr.as_deref().unwrap_or("-"),
                    status = values.status_code().map_or(0, |s| s.as_u16()),
                    elapsed_ms = values.elapsed().as_millis() as u64,
                    "request completed"
                );

                result
            }
        })
    }
}
