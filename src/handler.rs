//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one table, and
//! middleware wraps handlers it knows nothing about. Both work on the same
//! trait object, [`BoxedHandler`].
//!
//! ```text
//! async fn get_beer(ctx: Context, req: Request) -> Result<Response, Error>
//!        ↓ app.get("v1", "/beers/:id", get_beer)
//! get_beer.into_boxed_handler()                    ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_beer))                    ← stored as BoxedHandler
//!        ↓ middleware.wrap(boxed) for every layer, once, at registration
//! handler.call(ctx, req) at request time           ← one vtable dispatch per layer
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future resolving to a handler result.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// Object-safe dispatch interface.
///
/// Middleware receives the next handler in the chain as a [`BoxedHandler`]
/// and calls it through this trait.
pub trait ErasedHandler {
    fn call(&self, ctx: Context, req: Request) -> HandlerFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the signature:
///
/// ```text
/// async fn name(ctx: Context, req: Request) -> Result<impl IntoResponse, Error>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Boxes any handler. Middleware uses this to turn its wrapping closure back
/// into a [`BoxedHandler`].
pub fn from_fn(handler: impl Handler) -> BoxedHandler {
    handler.into_boxed_handler()
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, ctx: Context, req: Request) -> HandlerFuture {
        let fut = (self.0)(ctx.clone(), req);
        Box::pin(async move {
            let res = fut.await?.into_response();
            // Every layer records what it hands back, so the outermost one
            // leaves the status that actually goes on the wire.
            ctx.values().set_status_code(res.status_code());
            Ok(res)
        })
    }
}
