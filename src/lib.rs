//! # taproom
//!
//! A small HTTP application framework for thin JSON CRUD services that sit
//! behind a reverse proxy.
//!
//! ## What it does
//!
//! - Versioned routing: `app.get("v1", "/beers/:id", handler)` serves
//!   `GET /v1/beers/{id}`, one radix tree per method via [`matchit`]
//! - A fixed middleware chain composed once per route at registration
//! - Per-request [`Context`]: trace id, start time, status, metrics,
//!   cancellation
//! - JSON decoding with field-level validation ([`decode`], [`Validate`])
//! - Error-to-response translation ([`middleware::Errors`]) and panic
//!   recovery ([`middleware::Panics`])
//! - Graceful shutdown on SIGTERM / Ctrl-C or when a handler returns
//!   [`Error::Shutdown`]
//!
//! What the proxy already owns (TLS, rate limiting, body-size limits, slow
//! clients) is left to the proxy.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use serde::Serialize;
//! use taproom::middleware::{Errors, Logger, Metrics, Panics};
//! use taproom::{App, Context, Error, Request, Response, Server, ServerConfig, logging, respond, shutdown};
//!
//! #[derive(Serialize)]
//! struct Beer {
//!     id: String,
//! }
//!
//! async fn get_beer(ctx: Context, req: Request) -> Result<Response, Error> {
//!     let id = req.param("id").unwrap_or_default();
//!     respond(&ctx, &Beer { id: id.to_owned() }, StatusCode::OK)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), taproom::ServerError> {
//!     let config = ServerConfig::from_env()?;
//!     logging::init(&config.log)?;
//!
//!     let (tx, rx) = shutdown::channel();
//!     let app = App::builder(tx)
//!         .wrap(Logger)
//!         .wrap(Errors)
//!         .wrap(Metrics)
//!         .wrap(Panics)
//!         .build()
//!         .get("v1", "/beers/:id", get_beer);
//!
//!     Server::from_config(&config).serve(app, rx).await?;
//!     Ok(())
//! }
//! ```

mod app;
mod config;
mod context;
mod decode;
mod error;
mod handler;
mod method;
mod metrics;
mod paging;
mod request;
mod respond;
mod response;
mod router;
mod server;

pub mod health;
pub mod logging;
pub mod middleware;
pub mod shutdown;

pub use app::{App, AppBuilder, TRACE_ID_HEADER};
pub use config::{ENV_PREFIX, ServerConfig};
pub use context::{Context, RequestValues};
pub use decode::{Checker, Validate, decode};
pub use error::{Error, FieldError, FieldErrors, ServerError};
pub use handler::{BoxedHandler, ErasedHandler, Handler, HandlerFuture, from_fn};
pub use method::{Method, UnknownMethod};
pub use self::metrics::{ERRORS, InMemoryMetrics, MetricsSink, PANICS, REQUESTS, RecorderMetrics};
pub use paging::{DEFAULT_PAGE, DEFAULT_SIZE, Page};
pub use request::Request;
pub use respond::{ErrorResponse, respond};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
