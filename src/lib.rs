//! # tsu-access-log
//!
//! Access logging for HTTP services behind a reverse proxy: one formatted
//! line per request, written through whatever logger you already have.
//!
//! The crate carries the minimal `tsu` host it runs in (a radix-tree
//! [`Router`], a hyper-based [`Server`] with graceful shutdown, and a
//! [`Middleware`](middleware::Middleware) chain), and the
//! [`AccessLog`](middleware::access_log::AccessLog) middleware itself.
//!
//! ## What a line looks like
//!
//! With the default, combined-log style template:
//!
//! ```text
//! 10.0.0.7 - - "GET /users/42?full=1 HTTP/1.1" 200 27 "" "curl/8.5.0"
//! ```
//!
//! Lines for `4xx`/`5xx` responses are written at error level, `3xx` at
//! warn, everything else at info.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu_access_log::middleware::access_log::{AccessLog, TracingSink};
//! use tsu_access_log::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     let app = Router::new()
//!         .get("/users/{id}", get_user)
//!         .wrap(AccessLog::with(TracingSink, r#":method :url :status :response-time ms"#));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use request::Request;
pub use response::{Body, IntoResponse, Response, ResponseBuilder};
pub use router::{Router, Service};
pub use server::Server;
