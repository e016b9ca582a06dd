//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered
//! with [`Router::wrap`] runs around every request, matched or not, so a
//! 404 still reaches the access log.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, Endpoint, Handler, SharedEndpoint};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<SharedEndpoint>>,
    layers: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), layers: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use http::Method;
    /// # use tsu_access_log::{Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` conflicts with an already registered route.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_endpoint())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Wrap every request in `middleware`. The first layer added is the
    /// outermost, except that layers reporting
    /// [`Middleware::outermost`] go ahead of all ordinary layers.
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        let at = if middleware.outermost() {
            self.layers.iter().take_while(|layer| layer.outermost()).count()
        } else {
            self.layers.len()
        };
        self.layers.insert(at, Arc::new(middleware));
        self
    }

    /// Freezes the router into a cloneable [`Service`].
    pub fn into_service(self) -> Service {
        Service {
            layers: self.layers.into(),
            endpoint: Arc::new(Routes(self.routes)),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// A frozen router: middleware chain plus route table.
///
/// Cloning is two `Arc` increments; the server clones one per connection.
#[derive(Clone)]
pub struct Service {
    layers: Arc<[BoxedMiddleware]>,
    endpoint: SharedEndpoint,
}

impl Service {
    /// Runs `req` through every middleware layer and then the matching route.
    pub fn call(&self, req: Request) -> BoxFuture {
        Next::new(Arc::clone(&self.layers), Arc::clone(&self.endpoint)).run(req)
    }
}

/// The innermost link of the chain: route lookup and dispatch.
struct Routes(HashMap<Method, MatchitRouter<SharedEndpoint>>);

impl Endpoint for Routes {
    fn call(&self, mut req: Request) -> BoxFuture {
        let Some(tree) = self.0.get(&req.method) else {
            return Box::pin(async { Response::status(StatusCode::NOT_FOUND) });
        };
        let Ok(matched) = tree.at(req.uri.path()) else {
            return Box::pin(async { Response::status(StatusCode::NOT_FOUND) });
        };

        let handler = Arc::clone(matched.value);
        req.params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        handler.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;
    use bytes::Bytes;

    fn request(method: Method, uri: &str) -> Request {
        Request::from_http(
            http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap(),
        )
    }

    async fn echo_id(req: Request) -> String {
        req.param("id").unwrap_or("none").to_owned()
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let svc = Router::new().get("/users/{id}", echo_id).into_service();

        let res = svc.call(request(Method::GET, "/users/42")).await;
        assert_eq!(res.status_code(), StatusCode::OK);

        let res = svc.call(request(Method::POST, "/users/42")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        let res = svc.call(request(Method::GET, "/nowhere")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    fn tag(name: &'static str) -> impl Middleware {
        from_fn(move |req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.headers_mut().append("x-layer", http::HeaderValue::from_static(name));
            res
        })
    }

    #[tokio::test]
    async fn first_layer_is_outermost() {
        let svc = Router::new()
            .get("/", |_req: Request| async { "ok" })
            .wrap(tag("outer"))
            .wrap(tag("inner"))
            .into_service();

        let res = svc.call(request(Method::GET, "/")).await;
        let layers: Vec<_> = res.headers().get_all("x-layer").iter().collect();
        assert_eq!(layers, ["inner", "outer"]);
    }

    /// Tags like [`tag`] but asks to be placed outside ordinary layers.
    struct Wire(&'static str);

    impl Middleware for Wire {
        fn call(&self, req: Request, next: Next) -> BoxFuture {
            let name = self.0;
            Box::pin(async move {
                let mut res = next.run(req).await;
                res.headers_mut().append("x-layer", http::HeaderValue::from_static(name));
                res
            })
        }

        fn outermost(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn outermost_layers_go_ahead_of_ordinary_ones() {
        let svc = Router::new()
            .get("/", |_req: Request| async { "ok" })
            .wrap(tag("compress"))
            .wrap(Wire("wire-1"))
            .wrap(tag("auth"))
            .wrap(Wire("wire-2"))
            .into_service();

        let res = svc.call(request(Method::GET, "/")).await;
        let layers: Vec<_> = res.headers().get_all("x-layer").iter().collect();
        assert_eq!(layers, ["auth", "compress", "wire-2", "wire-1"]);
    }
}
