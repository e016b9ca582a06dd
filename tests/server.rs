use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use hyper::body::{Body, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tsu_access_log::middleware::access_log::{AccessLog, LogSink, Severity};
use tsu_access_log::{Request, Response, Router, Server};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(Severity, String)>>>);

impl Recorder {
    fn lines(&self) -> Vec<(Severity, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl LogSink for Recorder {
    fn log(&self, severity: Severity, message: &str) {
        self.0.lock().unwrap().push((severity, message.to_owned()));
    }
}

/// A body with no known length, so hyper sends it chunked.
struct Chunks(VecDeque<Bytes>);

impl Body for Chunks {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        Poll::Ready(self.0.pop_front().map(|chunk| Ok(Frame::data(chunk))))
    }
}

fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

async fn fetch(addr: &str, method: &str, path: &str) -> String {
    let mut stream = None;
    for _ in 0..100 {
        if let Ok(s) = TcpStream::connect(addr).await {
            stream = Some(s);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut stream = stream.expect("server did not start");

    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nUser-Agent: curl/8.0\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn every_completed_request_is_logged_once() {
    let recorder = Recorder::default();
    let access_log = AccessLog::builder(recorder.clone())
        .format(":remote-addr :method :url HTTP/:http-version :status :content-length :user-agent")
        .skip_pattern(r"\.gif$")
        .unwrap()
        .build();

    let app = Router::new()
        .get("/hello", |_req: Request| async { "hello" })
        .get("/stream", |_req: Request| async {
            let chunks = ["one ", "two ", "three"].map(|s: &'static str| Bytes::from_static(s.as_bytes()));
            Response::builder().stream("text/plain", Chunks(chunks.into_iter().collect()))
        })
        .on(Method::HEAD, "/hello", |_req: Request| async { "hello" })
        .get("/gone", |_req: Request| async {
            Response::builder().status(StatusCode::NO_CONTENT).text("never sent")
        })
        .wrap(access_log);

    let addr = free_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(Server::bind(&addr).serve_with_shutdown(app, async {
        let _ = stopped.await;
    }));

    let res = fetch(&addr, "GET", "/hello?x=1").await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.ends_with("hello"), "{res}");

    let res = fetch(&addr, "GET", "/stream").await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");

    let res = fetch(&addr, "GET", "/missing").await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    let res = fetch(&addr, "GET", "/pic.gif").await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    let res = fetch(&addr, "HEAD", "/hello").await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.to_ascii_lowercase().contains("content-length: 5"), "{res}");
    assert!(!res.ends_with("hello"), "{res}");

    let res = fetch(&addr, "GET", "/gone").await;
    assert!(res.starts_with("HTTP/1.1 204"), "{res}");
    assert!(!res.contains("never sent"), "{res}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    assert_eq!(
        recorder.lines(),
        [
            (Severity::Info, "127.0.0.1 GET /hello?x=1 HTTP/1.1 200 5 curl/8.0".to_owned()),
            (Severity::Info, "127.0.0.1 GET /stream HTTP/1.1 200 - curl/8.0".to_owned()),
            (Severity::Error, "127.0.0.1 GET /missing HTTP/1.1 404 0 curl/8.0".to_owned()),
            (Severity::Info, "127.0.0.1 HEAD /hello HTTP/1.1 200 5 curl/8.0".to_owned()),
            (Severity::Info, "127.0.0.1 GET /gone HTTP/1.1 204 0 curl/8.0".to_owned()),
        ]
    );
}
