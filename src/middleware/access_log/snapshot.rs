use std::net::SocketAddr;

use http::header::{CONTENT_LENGTH, REFERER, USER_AGENT};
use http::{HeaderMap, Version};

use crate::request::Request;

/// Address of the connection nested inside the one a request arrived on,
/// for transports that tunnel (CONNECT, PROXY-protocol shims).
///
/// A transport inserts it into the request extensions; the access log falls
/// back to it when the request has no direct peer address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TunneledPeer(pub SocketAddr);

/// What the access log keeps of a request once it has been forwarded.
#[derive(Clone, Debug)]
pub struct RequestSnapshot {
    pub method: String,
    /// Path and query exactly as received.
    pub url: String,
    pub version: (u8, u8),
    pub remote_addr: Option<String>,
    pub headers: HeaderMap,
}

impl RequestSnapshot {
    pub fn of(req: &Request) -> Self {
        let remote_addr = req
            .remote_addr()
            .or_else(|| req.extensions().get::<TunneledPeer>().map(|peer| peer.0))
            .map(|addr| addr.ip().to_string());

        Self {
            method: req.method().as_str().to_owned(),
            url: req.uri().to_string(),
            version: version_pair(req.version()),
            remote_addr,
            headers: req.headers().clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Either spelling of the referrer header.
    pub fn referrer(&self) -> Option<&str> {
        self.header(REFERER.as_str()).or_else(|| self.header("referrer"))
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(USER_AGENT.as_str())
    }
}

/// The response as the access log saw it at header-send, plus the length
/// settled at body end.
#[derive(Clone, Debug, Default)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
}

impl ResponseSnapshot {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Length` header if one was sent, else the finalized length.
    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse().ok())
            .or(self.content_length)
    }
}

fn version_pair(version: Version) -> (u8, u8) {
    match version {
        Version::HTTP_09 => (0, 9),
        Version::HTTP_10 => (1, 0),
        Version::HTTP_2 => (2, 0),
        Version::HTTP_3 => (3, 0),
        _ => (1, 1),
    }
}
