//! Health-check handlers.
//!
//! | Probe | Suggested path | Question |
//! |---|---|---|
//! | **Liveness** | `/v1/liveness` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/v1/readiness` | Can it serve traffic? Failure → pulled from the load balancer. |
//!
//! Both are ordinary handlers:
//!
//! ```rust,no_run
//! use taproom::{App, health, shutdown};
//!
//! async fn ping_database() -> Result<(), std::io::Error> {
//!     Ok(())
//! }
//!
//! let (tx, _rx) = shutdown::channel();
//! let app = App::new(tx)
//!     .get("v1", "/liveness", health::liveness)
//!     .get("v1", "/readiness", health::readiness_with(ping_database));
//! ```

use std::fmt::Display;
use std::future::Future;

use futures::future::BoxFuture;
use http::StatusCode;
use serde::Serialize;
use tracing::warn;

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::respond::respond;
use crate::response::Response;

#[derive(Debug, Serialize)]
struct Status {
    status: &'static str,
}

/// Always `200 {"status":"ok"}`.
pub async fn liveness(ctx: Context, _req: Request) -> Result<Response, Error> {
    respond(&ctx, &Status { status: "ok" }, StatusCode::OK)
}

/// `200 {"status":"ok"}` for a service with no dependencies to check.
pub async fn readiness(ctx: Context, _req: Request) -> Result<Response, Error> {
    respond(&ctx, &Status { status: "ok" }, StatusCode::OK)
}

/// A readiness handler that runs `check` on every probe.
///
/// `200 {"status":"ok"}` when the check passes, `503 {"status":"not ready"}`
/// when it fails. The failure itself is logged, never sent to the prober.
pub fn readiness_with<F, Fut, E>(
    check: F,
) -> impl Fn(Context, Request) -> BoxFuture<'static, Result<Response, Error>> + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send,
{
    move |ctx: Context, _req: Request| -> BoxFuture<'static, Result<Response, Error>> {
        let checked = check();
        Box::pin(async move {
            match checked.await {
                Ok(()) => respond(&ctx, &Status { status: "ok" }, StatusCode::OK),
                Err(e) => {
                    warn!(trace_id = ctx.values().trace_id(), error = %e, "readiness check failed");
                    respond(&ctx, &Status { status: "not ready" }, StatusCode::SERVICE_UNAVAILABLE)
                }
            }
        })
    }
}
