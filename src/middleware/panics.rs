//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::error;

use super::Middleware;
use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, from_fn};
use crate::metrics::PANICS;
use crate::request::Request;

/// Catches a panic in the inner chain and returns it as
/// [`Error::Unexpected`], so the layers outside still produce a response and
/// the connection task keeps running.
#[derive(Clone, Copy, Debug, Default)]
pub struct Panics;

impl Middleware for Panics {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        from_fn(move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                // The call itself happens inside the guarded future so that a
                // handler panicking before its first await is caught as well.
                let guarded = AssertUnwindSafe(async { next.call(ctx.clone(), req).await });

                match guarded.catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        ctx.metrics().increment(PANICS);
                        let message = panic_message(&*payload);
                        error!(trace_id = ctx.values().trace_id(), panic = %message, "handler panicked");
                        Err(Error::Unexpected(format!("PANIC [{message}]")))
                    }
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
