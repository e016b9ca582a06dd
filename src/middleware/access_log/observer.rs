//! Per-request observation.
//!
//! An [`Observer`] moves through `Armed → HeadersSent → Finalized` exactly
//! once. The middleware drives it from two points: the response coming
//! back through the chain (headers are about to be sent) and the response
//! body yielding its last frame. Neither point changes what goes on the wire.
//!
//! Completion is observed by wrapping the body in an [`ObservedBody`]
//! rather than by touching the response object itself. If the body is
//! dropped before it ends (the client went away) the observer never
//! finalizes and no line is written.

use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use http_body_util::BodyExt;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tracing::{debug, warn};

use super::Config;
use super::severity::Severity;
use super::snapshot::{RequestSnapshot, ResponseSnapshot};
use crate::response::Body;

/// A header-send call: status, optional reason phrase, headers.
///
/// Built from whichever shape the transport has at hand:
///
/// ```rust
/// use http::HeaderMap;
/// use tsu_access_log::middleware::access_log::Head;
///
/// let headers = HeaderMap::new();
/// let a = Head::from((200u16, headers.clone()));
/// let b = Head::from((200u16, "OK", headers));
/// assert_eq!(a.status, b.status);
/// assert_eq!(a.headers, b.headers);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Head {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: HeaderMap,
}

impl From<u16> for Head {
    fn from(status: u16) -> Self {
        Self { status, ..Default::default() }
    }
}

impl From<(u16, HeaderMap)> for Head {
    fn from((status, headers): (u16, HeaderMap)) -> Self {
        Self { status, reason: None, headers }
    }
}

impl From<(u16, &str)> for Head {
    fn from((status, reason): (u16, &str)) -> Self {
        Self { status, reason: Some(reason.to_owned()), headers: HeaderMap::new() }
    }
}

impl From<(u16, &str, HeaderMap)> for Head {
    fn from((status, reason, headers): (u16, &str, HeaderMap)) -> Self {
        Self { status, reason: Some(reason.to_owned()), headers }
    }
}

/// One finished access line, handed to the sink and then dropped.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub started_at: DateTime<Utc>,
    pub status: u16,
    pub elapsed: Duration,
    pub severity: Severity,
    pub message: String,
}

enum State {
    Armed,
    HeadersSent(Head),
    Finalized,
}

/// Tracks a single request from installation to the end of its body.
pub struct Observer {
    config: Arc<Config>,
    request: RequestSnapshot,
    started: Instant,
    started_at: DateTime<Utc>,
    state: State,
}

impl Observer {
    pub(crate) fn arm(config: Arc<Config>, request: RequestSnapshot) -> Self {
        Self {
            config,
            request,
            started: Instant::now(),
            started_at: Utc::now(),
            state: State::Armed,
        }
    }

    /// Captures status, reason and headers. Only the first call counts:
    /// once headers are sent they are frozen.
    pub fn write_head(&mut self, head: impl Into<Head>) {
        if let State::Armed = self.state {
            self.state = State::HeadersSent(head.into());
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, State::Finalized)
    }

    /// Closes the exchange and writes the line. `live_status` is used only
    /// when no headers were captured; the captured status wins otherwise.
    /// Calls after the first are ignored.
    pub fn end(&mut self, live_status: u16, content_length: Option<u64>) {
        let head = match std::mem::replace(&mut self.state, State::Finalized) {
            State::Armed => Head::from(live_status),
            State::HeadersSent(head) => head,
            State::Finalized => return,
        };

        let elapsed = self.started.elapsed();
        let response = ResponseSnapshot {
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            content_length,
        };
        let record = LogRecord {
            started_at: self.started_at,
            status: response.status,
            elapsed,
            severity: Severity::classify(response.status),
            message: self.config.template.render(&self.request, &response, elapsed, Utc::now()),
        };

        let sink = &self.config.sink;
        if panic::catch_unwind(AssertUnwindSafe(|| sink.record(&record))).is_err() {
            warn!(status = record.status, url = %self.request.url, "access log sink panicked, line dropped");
        }
    }
}

/// Response body that finalizes its [`Observer`] when the last frame is
/// yielded. Frames, size hint and end-of-stream pass through unchanged.
pub struct ObservedBody {
    inner: Body,
    observer: Observer,
    live_status: u16,
    length: Option<u64>,
}

impl ObservedBody {
    /// Wraps `body` so that `observer` finalizes when it ends. A body that
    /// is already complete (no frames will ever be polled) finalizes now.
    pub fn wrap(body: Body, mut observer: Observer, live_status: u16) -> Body {
        let length = body.size_hint().exact();
        if body.is_end_stream() {
            observer.end(live_status, length);
            return body;
        }
        Self { inner: body, observer, live_status, length }.boxed()
    }

    fn finish(&mut self) {
        self.observer.end(self.live_status, self.length);
    }
}

impl HttpBody for ObservedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            // hyper stops polling once `is_end_stream` turns true, so the
            // last data frame has to finalize on its own.
            Poll::Ready(Some(_)) if this.inner.is_end_stream() => this.finish(),
            Poll::Ready(None) => this.finish(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        if !self.observer.is_finalized() {
            debug!(url = %self.observer.request.url, "response body dropped before its end, no access line");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use http_body_util::Full;

    use super::*;
    use crate::middleware::access_log::{AccessLog, LogSink};
    use crate::middleware::access_log::testing::{Recorder, snapshot};

    fn armed(template: &str, recorder: &Recorder) -> Observer {
        let log = AccessLog::with(recorder.clone(), template);
        Observer::arm(Arc::clone(&log.config), snapshot("GET", "http://url"))
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers
    }

    #[test]
    fn header_send_shapes_capture_the_same_thing() {
        let two = Head::from((200u16, json_headers()));
        let three = Head::from((200u16, "OK", json_headers()));
        assert_eq!(two.status, three.status);
        assert_eq!(two.headers, three.headers);
        assert_eq!(three.reason.as_deref(), Some("OK"));

        let reason_only = Head::from((404u16, "Gone Fishing"));
        assert!(reason_only.headers.is_empty());
        assert_eq!(reason_only.reason.as_deref(), Some("Gone Fishing"));
    }

    #[test]
    fn three_value_head_renders_response_headers() {
        let recorder = Recorder::default();
        let mut observer = armed(":res[Content-Type]", &recorder);
        observer.write_head((200u16, "OK", json_headers()));
        observer.end(200, None);

        assert_eq!(recorder.lines(), [(Severity::Info, "application/json".to_owned())]);
    }

    #[test]
    fn captured_status_beats_live_status() {
        let recorder = Recorder::default();
        let mut observer = armed(":status", &recorder);
        observer.write_head(302u16);
        observer.end(200, None);

        assert_eq!(recorder.lines(), [(Severity::Warn, "302".to_owned())]);
    }

    #[test]
    fn headers_are_frozen_after_first_send() {
        let recorder = Recorder::default();
        let mut observer = armed(":status", &recorder);
        observer.write_head(201u16);
        observer.write_head(500u16);
        observer.end(500, None);

        assert_eq!(recorder.lines(), [(Severity::Info, "201".to_owned())]);
    }

    #[test]
    fn end_without_head_falls_back_to_live_status() {
        let recorder = Recorder::default();
        let mut observer = armed(":status :content-length", &recorder);
        observer.end(404, Some(9));

        assert_eq!(recorder.lines(), [(Severity::Error, "404 9".to_owned())]);
    }

    #[test]
    fn end_is_idempotent() {
        let recorder = Recorder::default();
        let mut observer = armed(":status", &recorder);
        observer.write_head(200u16);
        observer.end(200, None);
        observer.end(200, None);

        assert!(observer.is_finalized());
        assert_eq!(recorder.lines().len(), 1);
    }

    struct FullDisk;

    impl LogSink for FullDisk {
        fn log(&self, _severity: Severity, _message: &str) {
            panic!("disk full");
        }
    }

    #[test]
    fn panicking_sink_is_contained() {
        let log = AccessLog::new(FullDisk);
        let mut observer = Observer::arm(Arc::clone(&log.config), snapshot("GET", "/"));
        observer.write_head(200u16);
        observer.end(200, None);

        assert!(observer.is_finalized());
    }

    /// Streams its chunks one frame at a time with no size hint.
    struct Chunks(VecDeque<Bytes>);

    impl HttpBody for Chunks {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Ready(self.0.pop_front().map(|chunk| Ok(Frame::data(chunk))))
        }
    }

    fn chunks(parts: &[&'static str]) -> Body {
        Chunks(parts.iter().copied().map(|p| Bytes::from_static(p.as_bytes())).collect()).boxed()
    }

    #[tokio::test]
    async fn streamed_body_finalizes_once_at_the_end() {
        let recorder = Recorder::default();
        let mut observer = armed(":status :content-length", &recorder);
        observer.write_head(200u16);

        let body = ObservedBody::wrap(chunks(&["hello, ", "world"]), observer, 200);
        assert!(recorder.lines().is_empty());

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello, world");
        assert_eq!(recorder.lines(), [(Severity::Info, "200 -".to_owned())]);
    }

    #[tokio::test]
    async fn sized_body_finalizes_on_its_last_frame() {
        let recorder = Recorder::default();
        let mut observer = armed(":content-length", &recorder);
        observer.write_head(200u16);

        let mut body = ObservedBody::wrap(Full::new(Bytes::from_static(b"12345")).boxed(), observer, 200);
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"12345"));
        assert!(body.is_end_stream());
        assert_eq!(recorder.lines(), [(Severity::Info, "5".to_owned())]);
    }

    #[tokio::test]
    async fn dropped_body_writes_nothing() {
        let recorder = Recorder::default();
        let mut observer = armed(":status", &recorder);
        observer.write_head(200u16);

        let mut body = ObservedBody::wrap(chunks(&["a", "b"]), observer, 200);
        let _ = body.frame().await;
        drop(body);

        assert!(recorder.lines().is_empty());
    }

    #[test]
    fn empty_body_finalizes_immediately() {
        let recorder = Recorder::default();
        let mut observer = armed(":status :content-length", &recorder);
        observer.write_head(204u16);

        let _body = ObservedBody::wrap(http_body_util::Empty::new().boxed(), observer, 204);
        assert_eq!(recorder.lines(), [(Severity::Info, "204 0".to_owned())]);
    }
}
