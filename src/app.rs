//! The application: routes, middleware, and per-request dispatch.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info_span, warn};

use crate::context::Context;
use crate::error::{Error, ServerError};
use crate::handler::Handler;
use crate::method::Method;
use crate::metrics::{InMemoryMetrics, MetricsSink};
use crate::middleware::{Middleware, compose};
use crate::request::Request;
use crate::respond::{ErrorResponse, error_response, reason, status_response};
use crate::response::Response;
use crate::router::{Lookup, Routes, versioned};
use crate::shutdown::{ShutdownSender, Signal};

/// Response header carrying the request's trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Configures the parts of an [`App`] that every route shares.
pub struct AppBuilder {
    shutdown: ShutdownSender,
    middlewares: Vec<Arc<dyn Middleware>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl AppBuilder {
    /// Appends `middleware` to the chain applied to every route. The first
    /// one added is the outermost.
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Where the built-in middleware count things. Defaults to a fresh
    /// [`InMemoryMetrics`].
    pub fn metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn build(self) -> App {
        App {
            routes: Routes::default(),
            middlewares: self.middlewares,
            shutdown: self.shutdown,
            metrics: self.metrics.unwrap_or_else(|| Arc::new(InMemoryMetrics::new())),
        }
    }
}

/// The application router.
///
/// Built once at startup: the middleware chain is fixed by the
/// [`AppBuilder`], then routes are registered and each handler is wrapped in
/// that chain exactly once. Pass the finished app to
/// [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// use http::StatusCode;
/// use taproom::middleware::{Errors, Logger, Metrics, Panics};
/// use taproom::{App, Context, Error, Request, Response, respond, shutdown};
///
/// async fn query(ctx: Context, _req: Request) -> Result<Response, Error> {
///     respond(&ctx, &Vec::<String>::new(), StatusCode::OK)
/// }
///
/// let (tx, _rx) = shutdown::channel();
/// let app = App::builder(tx)
///     .wrap(Logger)
///     .wrap(Errors)
///     .wrap(Metrics)
///     .wrap(Panics)
///     .build()
///     .get("v1", "/beers", query);
/// ```
pub struct App {
    routes: Routes,
    middlewares: Vec<Arc<dyn Middleware>>,
    shutdown: ShutdownSender,
    metrics: Arc<dyn MetricsSink>,
}

impl App {
    pub fn builder(shutdown: ShutdownSender) -> AppBuilder {
        AppBuilder { shutdown, middlewares: Vec::new(), metrics: None }
    }

    /// An app without any middleware.
    pub fn new(shutdown: ShutdownSender) -> Self {
        Self::builder(shutdown).build()
    }

    /// Registers `handler` for `method` at `/{version}{path}`.
    ///
    /// `path` may name parameters as `:id` or `{id}`.
    ///
    /// # Panics
    ///
    /// Panics if the route conflicts with one already registered. Use
    /// [`try_handle`](Self::try_handle) to get the error instead.
    pub fn handle(self, method: Method, version: &str, path: &str, handler: impl Handler) -> Self {
        self.handle_with(method, version, path, handler, [])
    }

    /// Like [`handle`](Self::handle), with `extra` middleware placed inside
    /// the app-wide chain, closest to the handler.
    ///
    /// # Panics
    ///
    /// Panics if the route conflicts with one already registered.
    pub fn handle_with(
        mut self,
        method: Method,
        version: &str,
        path: &str,
        handler: impl Handler,
        extra: impl IntoIterator<Item = Arc<dyn Middleware>>,
    ) -> Self {
        if let Err(e) = self.try_handle_with(method, version, path, handler, extra) {
            panic!("{e}");
        }
        self
    }

    pub fn try_handle(
        &mut self,
        method: Method,
        version: &str,
        path: &str,
        handler: impl Handler,
    ) -> Result<(), ServerError> {
        self.try_handle_with(method, version, path, handler, [])
    }

    pub fn try_handle_with(
        &mut self,
        method: Method,
        version: &str,
        path: &str,
        handler: impl Handler,
        extra: impl IntoIterator<Item = Arc<dyn Middleware>>,
    ) -> Result<(), ServerError> {
        let extra: Vec<_> = extra.into_iter().collect();
        let chain = compose(compose(handler.into_boxed_handler(), &extra), &self.middlewares);
        self.routes.insert(method, &versioned(version, path), chain)
    }

    pub fn get(self, version: &str, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::Get, version, path, handler)
    }

    pub fn post(self, version: &str, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::Post, version, path, handler)
    }

    pub fn put(self, version: &str, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::Put, version, path, handler)
    }

    pub fn delete(self, version: &str, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::Delete, version, path, handler)
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Runs one request through the app without a network connection.
    pub async fn call<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        self.dispatch(req, None, &CancellationToken::new()).await
    }

    /// Routes one request and produces one response. Never fails: every
    /// outcome, including a shutdown request, becomes a response.
    pub(crate) async fn dispatch<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
        cancel: &CancellationToken,
    ) -> http::Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        let ctx = Context::with_cancellation(Arc::clone(&self.metrics), cancel.child_token());
        // Dropped when hyper drops this future (client gone) or on return.
        let _guard = ctx.cancellation().clone().drop_guard();

        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();

        let Ok(method) = Method::try_from(&parts.method) else {
            return finish(&ctx, fallback(&ctx, StatusCode::METHOD_NOT_ALLOWED));
        };

        let (handler, params) = match self.routes.lookup(method, &path) {
            Lookup::Found(handler, params) => (handler, params),
            Lookup::MethodNotAllowed => {
                return finish(&ctx, fallback(&ctx, StatusCode::METHOD_NOT_ALLOWED));
            }
            Lookup::NotFound => return finish(&ctx, fallback(&ctx, StatusCode::NOT_FOUND)),
        };

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = ctx.values().trace_id(), "reading request body: {e}");
                let body = ErrorResponse::new("unable to read request body");
                return finish(&ctx, status_response(&ctx, StatusCode::BAD_REQUEST, &body));
            }
        };

        let span = info_span!(
            "request",
            trace_id = ctx.values().trace_id(),
            method = %method,
            path = %path,
        );
        let request = Request::new(method, parts.uri, parts.headers, body, params, remote_addr);

        let response = match handler.call(ctx.clone(), request).instrument(span).await {
            Ok(res) => res,
            Err(err) if err.is_shutdown() => self.shutdown_requested(&ctx, &err),
            Err(err) => {
                error!(trace_id = ctx.values().trace_id(), error = %err, "unhandled error");
                error_response(&ctx, &err)
            }
        };

        finish(&ctx, response)
    }

    fn shutdown_requested(&self, ctx: &Context, err: &Error) -> Response {
        let first = self.shutdown.signal(Signal::Terminate);
        error!(trace_id = ctx.values().trace_id(), error = %err, first, "signalling shutdown");

        let status = StatusCode::SERVICE_UNAVAILABLE;
        status_response(ctx, status, &ErrorResponse::new(reason(status)))
    }
}

fn fallback(ctx: &Context, status: StatusCode) -> Response {
    status_response(ctx, status, &ErrorResponse::new(reason(status)))
}

fn finish(ctx: &Context, mut res: Response) -> http::Response<Full<Bytes>> {
    ctx.values().set_status_code(res.status_code());
    res.push_header(TRACE_ID_HEADER, ctx.values().trace_id());
    res.into_inner()
}
