//! Per-request context.
//!
//! Every handler and middleware receives a [`Context`] next to the
//! [`Request`](crate::Request). The app creates exactly one per request,
//! before the middleware chain runs, and drops it when the response is sent.
//! Cloning a `Context` is cheap and every clone refers to the same
//! [`RequestValues`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use http::StatusCode;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::metrics::MetricsSink;

/// Request-scoped values: when the request started, its trace id, and the
/// status code the response was written with.
#[derive(Debug)]
pub struct RequestValues {
    trace_id: String,
    now: DateTime<Utc>,
    started: Instant,
    status_code: AtomicU16,
}

impl RequestValues {
    pub(crate) fn new() -> Self {
        Self {
            trace_id: Uuid::now_v7().to_string(),
            now: Utc::now(),
            started: Instant::now(),
            status_code: AtomicU16::new(0),
        }
    }

    /// Time-sortable UUID v7 identifying this request in logs.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Wall-clock time the request arrived.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Time since the request arrived.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Status of the response, once one has been written.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self.status_code.load(Ordering::Acquire) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    pub(crate) fn set_status_code(&self, status: StatusCode) {
        self.status_code.store(status.as_u16(), Ordering::Release);
    }
}

/// What a handler knows about the request beyond the HTTP message itself.
#[derive(Clone)]
pub struct Context {
    values: Arc<RequestValues>,
    metrics: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
}

impl Context {
    /// A context with fresh values and its own cancellation token.
    ///
    /// The app builds these itself; this constructor is for calling handlers
    /// directly, e.g. from tests.
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_cancellation(metrics, CancellationToken::new())
    }

    pub(crate) fn with_cancellation(metrics: Arc<dyn MetricsSink>, cancel: CancellationToken) -> Self {
        Self { values: Arc::new(RequestValues::new()), metrics, cancel }
    }

    pub fn values(&self) -> &RequestValues {
        &self.values
    }

    pub fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }

    /// Cancelled when the client goes away or the server gives up waiting
    /// for in-flight requests during shutdown.
    ///
    /// Hand a child of this token to anything that outlives a single await
    /// (spawned tasks, long queries) so it stops with the request.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the request has been cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;

    #[test]
    fn fresh_values() {
        let ctx = Context::new(Arc::new(InMemoryMetrics::new()));
        let v = ctx.values();

        assert_eq!(v.trace_id().len(), 36);
        assert!(v.status_code().is_none());
        assert!(v.now() <= Utc::now());
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(RequestValues::new().trace_id(), RequestValues::new().trace_id());
    }

    #[test]
    fn clones_share_values() {
        let ctx = Context::new(Arc::new(InMemoryMetrics::new()));
        let clone = ctx.clone();
        clone.values().set_status_code(StatusCode::CREATED);

        assert_eq!(ctx.values().status_code(), Some(StatusCode::CREATED));
        assert_eq!(ctx.values().trace_id(), clone.values().trace_id());
    }

    #[tokio::test]
    async fn cancellation_is_observable() {
        let ctx = Context::new(Arc::new(InMemoryMetrics::new()));
        assert!(!ctx.is_cancelled());

        ctx.cancellation().cancel();
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }
}
