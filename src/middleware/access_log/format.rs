//! Access-line templates.
//!
//! A template is tokenized once, when the middleware is built, into literal
//! runs and placeholders. Rendering walks that list, so a value that happens
//! to contain `:status` is written as-is and never substituted again.
//!
//! | token | value |
//! |---|---|
//! | `:method` | request method |
//! | `:url` | path and query as received |
//! | `:status` | status captured at header-send |
//! | `:response-time` | elapsed milliseconds |
//! | `:date` | render time, RFC 1123 in GMT |
//! | `:referrer` | `Referer` / `Referrer` header |
//! | `:http-version` | e.g. `1.1` |
//! | `:remote-addr` | peer IP |
//! | `:user-agent` | `User-Agent` header |
//! | `:content-length` | response length, `-` if unknown |
//! | `:req[Name]` | any request header |
//! | `:res[Name]` | any response header, `Content-Length` included for sized bodies |
//!
//! Absent values render as the empty string (`-` for `:content-length`).

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::snapshot::{RequestSnapshot, ResponseSnapshot};

/// Combined-log style line used when no template is given.
pub const DEFAULT_FORMAT: &str =
    r#":remote-addr - - ":method :url HTTP/:http-version" :status :content-length ":referrer" ":user-agent""#;

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Method,
    Url,
    Status,
    ResponseTime,
    Date,
    Referrer,
    HttpVersion,
    RemoteAddr,
    UserAgent,
    ContentLength,
    RequestHeader(String),
    ResponseHeader(String),
}

const FIXED: [(&str, Segment); 10] = [
    (":method", Segment::Method),
    (":url", Segment::Url),
    (":status", Segment::Status),
    (":response-time", Segment::ResponseTime),
    (":date", Segment::Date),
    (":referrer", Segment::Referrer),
    (":http-version", Segment::HttpVersion),
    (":remote-addr", Segment::RemoteAddr),
    (":user-agent", Segment::UserAgent),
    (":content-length", Segment::ContentLength),
];

/// A parsed access-line template.
#[derive(Clone, Debug)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Tokenizes `template`. Never fails: anything that is not a known
    /// token, including a `:req[` with no closing bracket, stays literal.
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find(':') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match placeholder(tail) {
                Some((segment, len)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                    rest = &tail[len..];
                }
                None => {
                    literal.push(':');
                    rest = &tail[1..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Renders one line. `now` feeds `:date`; everything else comes from
    /// the snapshots, so equal inputs always give equal output.
    pub fn render(
        &self,
        req: &RequestSnapshot,
        res: &ResponseSnapshot,
        elapsed: Duration,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = String::with_capacity(128);
        for segment in &self.segments {
            // Writing into a String cannot fail.
            let _ = match segment {
                Segment::Literal(text) => out.write_str(text),
                Segment::Method => out.write_str(&req.method),
                Segment::Url => out.write_str(&req.url),
                Segment::Status => write!(out, "{}", res.status),
                Segment::ResponseTime => write!(out, "{}", elapsed.as_millis()),
                Segment::Date => write!(out, "{}", now.format(RFC1123)),
                Segment::Referrer => out.write_str(req.referrer().unwrap_or_default()),
                Segment::HttpVersion => write!(out, "{}.{}", req.version.0, req.version.1),
                Segment::RemoteAddr => out.write_str(req.remote_addr.as_deref().unwrap_or_default()),
                Segment::UserAgent => out.write_str(req.user_agent().unwrap_or_default()),
                Segment::ContentLength => match res.content_length() {
                    Some(len) => write!(out, "{len}"),
                    None => out.write_str("-"),
                },
                Segment::RequestHeader(name) => out.write_str(req.header(name).unwrap_or_default()),
                Segment::ResponseHeader(name) => out.write_str(res.header(name).unwrap_or_default()),
            };
        }
        out
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::parse(DEFAULT_FORMAT)
    }
}

impl From<&str> for Template {
    fn from(template: &str) -> Self {
        Self::parse(template)
    }
}

/// Matches the placeholder at the start of `tail` (which begins with `:`),
/// returning it and the number of bytes it spans.
fn placeholder(tail: &str) -> Option<(Segment, usize)> {
    let bracketed: [(&str, fn(String) -> Segment); 2] = [
        (":req[", Segment::RequestHeader),
        (":res[", Segment::ResponseHeader),
    ];
    for (prefix, make) in bracketed {
        if let Some(after) = tail.strip_prefix(prefix) {
            return match after.find(']') {
                Some(end) if end > 0 => Some((make(after[..end].to_owned()), prefix.len() + end + 1)),
                _ => None,
            };
        }
    }

    FIXED
        .iter()
        .find(|(name, _)| tail.starts_with(name))
        .map(|(name, segment)| (segment.clone(), name.len()))
}
