//! Middleware layer.
//!
//! Middleware sees every request before routing and every response after
//! the handler, which makes it the place for cross-cutting concerns. A
//! middleware receives the request plus a [`Next`] continuation and decides
//! what to do around `next.run(req)`.
//!
//! Layers registered with [`Router::wrap`](crate::Router::wrap) run in
//! registration order: the first one registered is the outermost. Layers
//! that report [`Middleware::outermost`] are the exception and always sit
//! ahead of ordinary ones.
//!
//! Built-in middleware:
//! - [`access_log`] — one formatted line per request, levelled by status

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, SharedEndpoint};
use crate::request::Request;
use crate::response::Response;

pub mod access_log;

/// A request/response interceptor.
///
/// The returned future must be `'static`: clone whatever shared state the
/// middleware needs (typically an `Arc`) into it.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;

    /// Whether this layer has to see the response exactly as the server
    /// writes it. The router places such layers outside every ordinary
    /// layer, keeping their relative registration order.
    fn outermost(&self) -> bool {
        false
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the chain: remaining middleware, then the router.
pub struct Next {
    layers: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: SharedEndpoint,
}

impl Next {
    pub(crate) fn new(layers: Arc<[BoxedMiddleware]>, endpoint: SharedEndpoint) -> Self {
        Self { layers, index: 0, endpoint }
    }

    /// Forwards the request to the next layer, or to the router once every
    /// layer has run. Consumes `self`, so it can run at most once.
    pub fn run(self, req: Request) -> BoxFuture {
        if let Some(layer) = self.layers.get(self.index).cloned() {
            let next = Next { index: self.index + 1, ..self };
            return layer.call(req, next);
        }
        self.endpoint.call(req)
    }
}

/// Middleware from an async closure.
///
/// ```rust
/// use tsu_access_log::middleware::{Next, from_fn};
/// use tsu_access_log::{Request, Router};
///
/// let app = Router::new()
///     .get("/", |_req: Request| async { "ok" })
///     .wrap(from_fn(|req: Request, next: Next| async move {
///         let mut res = next.run(req).await;
///         res.headers_mut().insert("x-served-by", "tsu".parse().unwrap());
///         res
///     }));
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(f)
}

/// See [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self.0)(req, next))
    }
}
