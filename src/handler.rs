//! Handlers and the type-erased endpoint they become.
//!
//! Everything at the inner end of a middleware chain is an [`Endpoint`]:
//! each registered route handler, and the route table that dispatches to
//! them. User code never names `Endpoint`; it writes
//!
//! ```text
//! async fn name(req: Request) -> impl IntoResponse
//! ```
//!
//! and [`Handler`] turns that into an `Arc<dyn Endpoint>` at registration
//! time. At request time the cost is one `Arc` clone and one virtual call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A boxed, `Send` future resolving to a [`Response`]. Returned by
/// endpoints and by [`Middleware::call`](crate::middleware::Middleware::call).
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Something that turns a request into a response future.
///
/// `#[doc(hidden)] pub` because it shows up in [`Handler`]'s signature.
#[doc(hidden)]
pub trait Endpoint: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type SharedEndpoint = Arc<dyn Endpoint>;

/// Implemented for every valid route handler: any `Fn(Request) -> Future`
/// whose output implements [`IntoResponse`].
///
/// Sealed, so the set of accepted shapes stays under this crate's control.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> SharedEndpoint;
}

mod sealed {
    pub trait Sealed {}
}

impl<F, Fut, R> sealed::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_endpoint(self) -> SharedEndpoint {
        Arc::new(HandlerFn(self))
    }
}

struct HandlerFn<F>(F);

impl<F, Fut, R> Endpoint for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let pending = (self.0)(req);
        Box::pin(async move { pending.await.into_response() })
    }
}
