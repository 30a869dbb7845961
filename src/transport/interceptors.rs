//! Cross-cutting request/response decorators.
//!
//! Each function here returns an [`Interceptor`]: a one-shot constructor
//! that wraps the next-stage executor. They are independent and
//! order-sensitive; `api::Client` assembles the conventional stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use tracing::debug;

use super::{BoxTransport, CACHE_TTL, Interceptor, OAUTH_CLIENT_ID, OAUTH_SCOPES, Request};
use crate::api::scopes::ScopeSet;

/// Resolves an already-provisioned token for a host. Token storage lives
/// outside the pipeline; this seam only injects.
pub trait TokenSource: Send + Sync {
    fn token_for(&self, host: &str) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn token_for(&self, host: &str) -> Option<String> {
        self(host)
    }
}

/// Set `Authorization` for the request's host. A header the caller set
/// themselves is never overwritten; explicit intent wins.
pub fn add_auth_header(tokens: Arc<dyn TokenSource>) -> Interceptor {
    Box::new(move |inner: BoxTransport| -> BoxTransport {
        Box::new(move |mut request: Request| {
            if !request.headers.contains_key(AUTHORIZATION) {
                let host = request.url.host_str().unwrap_or_default().to_string();
                if let Some(token) = tokens.token_for(&host) {
                    match HeaderValue::from_str(&format!("token {token}")) {
                        Ok(value) => {
                            request.headers.insert(AUTHORIZATION, value);
                        }
                        Err(error) => debug!(%error, "token not usable as a header value"),
                    }
                }
            }
            inner.execute(request)
        })
    })
}

/// Attach the cache-duration hint consumed by a cache stage that reads its
/// TTL per request. A hint already present is left alone.
pub fn add_cache_ttl_header(ttl: Duration) -> Interceptor {
    Box::new(move |inner: BoxTransport| -> BoxTransport {
        Box::new(move |mut request: Request| {
            if !request.headers.contains_key(&CACHE_TTL) {
                request
                    .headers
                    .insert(CACHE_TTL, HeaderValue::from(ttl.as_secs()));
            }
            inner.execute(request)
        })
    })
}

/// Watch every response for a named header and copy its value into `dest`
/// when non-empty, without coupling the pipeline to the consumer.
pub fn extract_header(name: HeaderName, dest: Arc<Mutex<Option<String>>>) -> Interceptor {
    Box::new(move |inner: BoxTransport| -> BoxTransport {
        Box::new(move |request: Request| {
            let response = inner.execute(request)?;
            let value = response.header_str(&name);
            if !value.is_empty() {
                *dest.lock() = Some(value.to_string());
            }
            Ok(response)
        })
    })
}

/// Warn once per pipeline when responses reveal that the token is missing
/// a required scope. The callback receives the OAuth client id the token
/// belongs to (possibly empty). The flag is a relaxed atomic: a racing
/// duplicate warning is tolerated, responses are never blocked on it.
pub fn check_scopes<W>(required: impl Into<String>, warn: W) -> Interceptor
where
    W: Fn(&str) + Send + Sync + 'static,
{
    let required = required.into();
    let warned = AtomicBool::new(false);
    Box::new(move |inner: BoxTransport| -> BoxTransport {
        Box::new(move |request: Request| {
            let response = inner.execute(request)?;
            if warned.load(Ordering::Relaxed) {
                return Ok(response);
            }
            let granted = response.header_str(&OAUTH_SCOPES);
            if granted.is_empty() {
                // No scopes header means a deployment that does not report
                // them; nothing to check against.
                return Ok(response);
            }
            if !ScopeSet::parse(granted).satisfies(&required)
                && !warned.swap(true, Ordering::Relaxed)
            {
                let client_id = response.header_str(&OAUTH_CLIENT_ID).to_string();
                warn(&client_id);
            }
            Ok(response)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Response, Transport, compose};
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode, Url};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    fn responder(headers: HeaderMap) -> BoxTransport {
        Box::new(move |request: Request| {
            Ok(Response {
                status: StatusCode::OK,
                headers: headers.clone(),
                url: request.url.clone(),
                body: Box::new(Cursor::new(Vec::new())),
            })
        })
    }

    #[test]
    fn test_auth_header_injected_for_host() {
        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let base: BoxTransport = Box::new(move |request: Request| {
            *sink.lock() = Some(request.header_str(AUTHORIZATION).to_string());
            Ok(Response {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                url: request.url.clone(),
                body: Box::new(Cursor::new(Vec::new())),
            })
        });

        let tokens: Arc<dyn TokenSource> = Arc::new(|host: &str| {
            (host == "api.forge.dev").then(|| "SECRET".to_string())
        });
        let transport = compose(base, vec![add_auth_header(tokens)]);
        transport.execute(request("https://api.forge.dev/zen")).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("token SECRET"));
    }

    #[test]
    fn test_auth_header_never_overwritten() {
        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let base: BoxTransport = Box::new(move |request: Request| {
            *sink.lock() = Some(request.header_str(AUTHORIZATION).to_string());
            Ok(Response {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                url: request.url.clone(),
                body: Box::new(Cursor::new(Vec::new())),
            })
        });

        let tokens: Arc<dyn TokenSource> = Arc::new(|_: &str| Some("SECRET".to_string()));
        let transport = compose(base, vec![add_auth_header(tokens)]);

        let mut req = request("https://api.forge.dev/zen");
        req.headers
            .insert(AUTHORIZATION, HeaderValue::from_static("token CALLER"));
        transport.execute(req).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("token CALLER"));
    }

    #[test]
    fn test_cache_ttl_header_attached_once() {
        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let base: BoxTransport = Box::new(move |request: Request| {
            *sink.lock() = Some(request.header_str(&CACHE_TTL).to_string());
            Ok(Response {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                url: request.url.clone(),
                body: Box::new(Cursor::new(Vec::new())),
            })
        });

        let transport = compose(
            base,
            vec![add_cache_ttl_header(Duration::from_secs(120))],
        );

        transport.execute(request("https://api.forge.dev/zen")).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("120"));

        // A caller-supplied hint wins.
        let mut req = request("https://api.forge.dev/zen");
        req.headers.insert(CACHE_TTL, HeaderValue::from_static("7"));
        transport.execute(req).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("7"));
    }

    #[test]
    fn test_extract_header_copies_value() {
        let mut headers = HeaderMap::new();
        headers.insert(OAUTH_SCOPES, HeaderValue::from_static("repo, read:org"));

        let dest: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let transport = compose(
            responder(headers),
            vec![extract_header(OAUTH_SCOPES, Arc::clone(&dest))],
        );
        transport.execute(request("https://api.forge.dev/zen")).unwrap();
        assert_eq!(dest.lock().as_deref(), Some("repo, read:org"));
    }

    #[test]
    fn test_scope_warning_fires_once() {
        let mut headers = HeaderMap::new();
        headers.insert(OAUTH_SCOPES, HeaderValue::from_static("gist"));
        headers.insert(OAUTH_CLIENT_ID, HeaderValue::from_static("abc123"));

        let warnings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&warnings);
        let transport = compose(
            responder(headers),
            vec![check_scopes("read:org", move |client_id: &str| {
                assert_eq!(client_id, "abc123");
                counter.fetch_add(1, Ordering::SeqCst);
            })],
        );

        for _ in 0..3 {
            transport.execute(request("https://api.forge.dev/zen")).unwrap();
        }
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scope_warning_respects_subsumption() {
        let mut headers = HeaderMap::new();
        headers.insert(OAUTH_SCOPES, HeaderValue::from_static("admin:org"));

        let warnings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&warnings);
        let transport = compose(
            responder(headers),
            vec![check_scopes("read:org", move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            })],
        );
        transport.execute(request("https://api.forge.dev/zen")).unwrap();
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scope_warning_skipped_without_header() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&warnings);
        let transport = compose(
            responder(HeaderMap::new()),
            vec![check_scopes("read:org", move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            })],
        );
        transport.execute(request("https://api.forge.dev/zen")).unwrap();
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }
}
