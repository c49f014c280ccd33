//! Error rendering.

use std::sync::Arc;

use http::StatusCode;
use tracing::{error, warn};

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxedHandler, from_fn};
use crate::request::Request;
use crate::respond::error_response;

/// Turns every error from the inner chain into a JSON error response.
///
/// The one error it does not resolve is [`Error::Shutdown`](crate::Error::Shutdown):
/// no response is written and the error is handed back to the app, which
/// signals the server to shut down.
#[derive(Clone, Copy, Debug, Default)]
pub struct Errors;

impl Middleware for Errors {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        from_fn(move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                let err = match next.call(ctx.clone(), req).await {
                    Ok(res) => return Ok(res),
                    Err(err) => err,
                };

                let trace_id = ctx.values().trace_id();
                if err.is_shutdown() {
                    error!(trace_id, error = %err, "handler requested shutdown");
                    ctx.values().set_status_code(StatusCode::SERVICE_UNAVAILABLE);
                    return Err(err);
                }

                let status = err.status();
                if status.is_server_error() {
                    error!(trace_id, status = status.as_u16(), error = %err, "request failed");
                } else {
                    warn!(trace_id, status = status.as_u16(), error = %err, "request rejected");
                }

                Ok(error_response(&ctx, &err))
            }
        })
    }
}
