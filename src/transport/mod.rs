//! HTTP transport pipeline.
//!
//! Every outbound request passes through a chain of interceptors composed
//! around a terminal executor. An interceptor is a function that takes the
//! next-stage executor and returns a new one, so cross-cutting behavior
//! (auth injection, caching, response sanitization, scope checks) stays
//! composable and order-explicit.

pub mod http;
pub mod interceptors;
pub mod sanitize;

pub use http::HttpTransport;
pub use interceptors::{
    TokenSource, add_auth_header, add_cache_ttl_header, check_scopes, extract_header,
};
pub use sanitize::{AsciiSanitizer, sanitize_controls};

use std::fmt;
use std::io::{self, Read};

use reqwest::header::{AsHeaderName, HeaderMap, HeaderName};
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;

/// Cache-duration hint (integer seconds) consumed by a per-request cache.
pub const CACHE_TTL: HeaderName = HeaderName::from_static("x-cache-ttl");
/// Scopes granted to the token behind a response.
pub const OAUTH_SCOPES: HeaderName = HeaderName::from_static("x-oauth-scopes");
/// Scopes the endpoint would have accepted; drives remediation hints.
pub const ACCEPTED_OAUTH_SCOPES: HeaderName = HeaderName::from_static("x-accepted-oauth-scopes");
/// OAuth application the token was minted for.
pub const OAUTH_CLIENT_ID: HeaderName = HeaderName::from_static("x-oauth-client-id");

/// Errors raised below the application level: the request never produced a
/// usable response. Timeouts and cancellation surface here untouched so
/// callers can tell them apart from server-side failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A request body. `Reader` streams; `buffer` pins it to bytes in place so
/// hashing a body never consumes it destructively.
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Read a streaming body to completion and keep the bytes, so the next
    /// stage still sees the full body. `Empty` and `Bytes` are untouched.
    pub fn buffer(&mut self) -> io::Result<&[u8]> {
        if let Body::Reader(reader) = self {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            *self = Body::Bytes(bytes);
        }
        Ok(match self {
            Body::Bytes(bytes) => bytes,
            _ => &[],
        })
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
            Body::Reader(_) => f.write_str("Body::Reader"),
        }
    }
}

/// An outbound request. Interceptors may add headers before dispatch; the
/// rest of the request is treated as immutable.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// Header value as a string; empty when absent or not valid UTF-8.
    pub fn header_str(&self, name: impl AsHeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }
}

/// A response with a streaming body. `url` is the request URL the response
/// answers, kept for error reporting; a cache hit is rebound to the
/// caller's request URL.
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: Box<dyn Read + Send>,
}

impl Response {
    /// Header value as a string; empty when absent or not valid UTF-8.
    pub fn header_str(&self, name: impl AsHeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// One-method request executor. The terminal implementation performs the
/// network call; everything else wraps another `Transport`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(Request) -> Result<Response, TransportError> + Send + Sync,
{
    fn execute(&self, request: Request) -> Result<Response, TransportError> {
        self(request)
    }
}

pub type BoxTransport = Box<dyn Transport>;

/// An executor decorator: takes the next stage, returns the wrapped stage.
pub type Interceptor = Box<dyn FnOnce(BoxTransport) -> BoxTransport>;

/// Compose interceptors around a base executor. Layers are listed
/// outermost first: the first entry sees requests before, and responses
/// after, every other layer.
pub fn compose(base: BoxTransport, layers: Vec<Interceptor>) -> BoxTransport {
    layers
        .into_iter()
        .rev()
        .fold(base, |inner, layer| layer(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_response(url: &Url, body: &str) -> Response {
        Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            url: url.clone(),
            body: Box::new(Cursor::new(body.as_bytes().to_vec())),
        }
    }

    #[test]
    fn test_compose_applies_layers_outermost_first() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let tag = |name: &'static str, order: Arc<parking_lot::Mutex<Vec<&'static str>>>| {
            let layer: Interceptor = Box::new(move |inner: BoxTransport| -> BoxTransport {
                Box::new(move |request: Request| {
                    order.lock().push(name);
                    inner.execute(request)
                })
            });
            layer
        };

        let base: BoxTransport = Box::new(|request: Request| {
            Ok(ok_response(&request.url, ""))
        });
        let transport = compose(
            base,
            vec![
                tag("outer", Arc::clone(&order)),
                tag("inner", Arc::clone(&order)),
            ],
        );

        let url = Url::parse("https://api.forge.dev/zen").unwrap();
        transport.execute(Request::new(Method::GET, url)).unwrap();
        assert_eq!(*order.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_body_buffer_preserves_streamed_bytes() {
        let mut body = Body::Reader(Box::new(Cursor::new(b"payload".to_vec())));
        assert_eq!(body.buffer().unwrap(), b"payload");
        // A second pass sees the identical bytes.
        assert_eq!(body.buffer().unwrap(), b"payload");
    }

    #[test]
    fn test_closure_transport_executes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transport: BoxTransport = Box::new(move |request: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ok_response(&request.url, "ok"))
        });

        let url = Url::parse("https://api.forge.dev/zen").unwrap();
        let response = transport.execute(Request::new(Method::GET, url)).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
