//! Access logging: one formatted line per request.
//!
//! ```rust,no_run
//! use tsu_access_log::middleware::access_log::{AccessLog, TracingSink};
//! use tsu_access_log::{Request, Router, Server};
//!
//! # async fn run() -> Result<(), tsu_access_log::Error> {
//! let app = Router::new()
//!     .get("/", |_req: Request| async { "hello" })
//!     .wrap(
//!         AccessLog::builder(TracingSink)
//!             .format(":method :url :status :response-time ms")
//!             .skip_pattern(r"\.(gif|jpe?g|png)$")?
//!             .build(),
//!     );
//!
//! Server::bind("0.0.0.0:3000").serve(app).await
//! # }
//! ```
//!
//! For every request the middleware checks the exclusion pattern against
//! the URL. Excluded requests go straight to the next layer. Everything
//! else gets an [`Observer`]: the status and headers are captured when the
//! response comes back through the chain, and the line is rendered and
//! written when the response body ends. Responses the server sends without
//! a body (`HEAD`, 1xx, 204, 304) are logged as soon as their head is
//! captured. The line's level follows the status: `>= 400` error, `>= 300`
//! warn, otherwise info.
//!
//! An access log always runs outside ordinary middleware
//! ([`Middleware::outermost`]), so the status, headers and body it sees are
//! the ones that go on the wire, whatever order layers were registered in.
//!
//! Logging never gets in the way of the request. The next layer always
//! runs exactly once, the body bytes pass through untouched, and a sink
//! that panics costs one line, not the response.

use std::sync::Arc;

use http::header::CONTENT_LENGTH;
use http::{HeaderValue, Method, StatusCode};
use hyper::body::Body as _;
use regex::Regex;
use tracing::debug;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

mod filter;
mod format;
mod observer;
mod severity;
mod sink;
mod snapshot;

pub use filter::Exclusion;
pub use format::{DEFAULT_FORMAT, Template};
pub use observer::{Head, LogRecord, ObservedBody, Observer};
pub use severity::Severity;
pub use sink::{LeveledSink, Leveled, LogSink, TracingSink};
pub use snapshot::{RequestSnapshot, ResponseSnapshot, TunneledPeer};

/// Everything one access log needs, fixed at build time and shared by every
/// request it handles.
pub(crate) struct Config {
    pub(crate) sink: Box<dyn LogSink>,
    pub(crate) template: Template,
    pub(crate) exclusion: Exclusion,
}

/// The second construction argument: either a template or, in its place,
/// an exclusion pattern (the default template is then used).
pub enum FormatArg {
    Template(String),
    Exclude(Regex),
}

impl From<&str> for FormatArg {
    fn from(template: &str) -> Self {
        Self::Template(template.to_owned())
    }
}

impl From<String> for FormatArg {
    fn from(template: String) -> Self {
        Self::Template(template)
    }
}

impl From<Regex> for FormatArg {
    fn from(pattern: Regex) -> Self {
        Self::Exclude(pattern)
    }
}

/// Marks a request that already has an observer attached.
#[derive(Clone, Copy)]
struct Observed;

/// Access-log middleware. Cheap to clone; clones share one configuration.
#[derive(Clone)]
pub struct AccessLog {
    config: Arc<Config>,
}

impl AccessLog {
    /// Default template, nothing excluded.
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self::builder(sink).build()
    }

    /// A template or an exclusion pattern, whichever `arg` is:
    ///
    /// ```rust
    /// use regex::Regex;
    /// use tsu_access_log::middleware::access_log::{AccessLog, TracingSink};
    ///
    /// AccessLog::with(TracingSink, ":method :url");
    /// AccessLog::with(TracingSink, Regex::new(r"\.gif|\.jpe?g").unwrap());
    /// ```
    pub fn with(sink: impl LogSink + 'static, arg: impl Into<FormatArg>) -> Self {
        let builder = Self::builder(sink);
        match arg.into() {
            FormatArg::Template(template) => builder.format(&template),
            FormatArg::Exclude(pattern) => builder.skip(pattern),
        }
        .build()
    }

    pub fn builder(sink: impl LogSink + 'static) -> AccessLogBuilder {
        AccessLogBuilder {
            sink: Box::new(sink),
            template: Template::default(),
            exclusion: Exclusion::none(),
        }
    }

    /// Attaches an observer to `req`, or returns `None` when the request is
    /// excluded or some access log is already observing it.
    pub fn observe(&self, req: &mut Request) -> Option<Observer> {
        if req.extensions().get::<Observed>().is_some() {
            debug!(url = %req.uri(), "request already observed");
            return None;
        }
        if self.config.exclusion.should_skip(&req.uri().to_string()) {
            debug!(url = %req.uri(), "request excluded from access log");
            return None;
        }

        req.extensions_mut().insert(Observed);
        Some(Observer::arm(Arc::clone(&self.config), RequestSnapshot::of(req)))
    }
}

impl Middleware for AccessLog {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let Some(mut observer) = self.observe(&mut req) else {
            return next.run(req);
        };

        let head_only = *req.method() == Method::HEAD;
        let response = next.run(req);
        Box::pin(async move {
            let res = response.await;
            let status = res.status.as_u16();
            let length = res.body.size_hint().exact();

            // The server derives Content-Length from an exact size hint.
            let mut headers = res.headers.clone();
            if carries_body(res.status) {
                if let Some(len) = length {
                    headers.entry(CONTENT_LENGTH).or_insert(HeaderValue::from(len));
                }
            }
            observer.write_head((status, headers));

            // The server writes the head of these and never polls the body.
            if !carries_body(res.status) {
                observer.end(status, Some(0));
                return res;
            }
            if head_only {
                observer.end(status, length);
                return res;
            }
            Response { body: ObservedBody::wrap(res.body, observer, status), ..res }
        })
    }

    fn outermost(&self) -> bool {
        true
    }
}

fn carries_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Fluent configuration for [`AccessLog`]. Obtain via [`AccessLog::builder`].
pub struct AccessLogBuilder {
    sink: Box<dyn LogSink>,
    template: Template,
    exclusion: Exclusion,
}

impl AccessLogBuilder {
    /// Line template such as `":method :url :status"`. An empty string keeps
    /// the default.
    pub fn format(mut self, template: &str) -> Self {
        if !template.is_empty() {
            self.template = Template::parse(template);
        }
        self
    }

    /// Skip requests whose URL matches `pattern`.
    pub fn skip(mut self, pattern: Regex) -> Self {
        self.exclusion = Exclusion::new(pattern);
        self
    }

    /// Like [`skip`](Self::skip), compiling `pattern` first.
    pub fn skip_pattern(mut self, pattern: &str) -> Result<Self, Error> {
        self.exclusion = Exclusion::parse(pattern)?;
        Ok(self)
    }

    pub fn build(self) -> AccessLog {
        AccessLog {
            config: Arc::new(Config {
                sink: self.sink,
                template: self.template,
                exclusion: self.exclusion,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use http::HeaderMap;

    use super::*;

    /// Keeps every delivered line for inspection.
    #[derive(Clone, Default)]
    pub(crate) struct Recorder(Arc<Mutex<Vec<(Severity, String)>>>);

    impl Recorder {
        pub(crate) fn lines(&self) -> Vec<(Severity, String)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl LogSink for Recorder {
        fn log(&self, severity: Severity, message: &str) {
            self.0.lock().unwrap().push((severity, message.to_owned()));
        }
    }

    pub(crate) fn snapshot(method: &str, url: &str) -> RequestSnapshot {
        RequestSnapshot {
            method: method.to_owned(),
            url: url.to_owned(),
            version: (1, 1),
            remote_addr: Some("my.remote.addr".to_owned()),
            headers: HeaderMap::new(),
        }
    }
}
