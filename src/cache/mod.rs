//! Disk-backed response cache, keyed by content-addressable request
//! digests.
//!
//! Entries are serialized HTTP/1.x responses stored under a sharded path
//! derived from the key's hex digest. Expiry is a read-time check against
//! the file's modification timestamp; there is no eviction sweep, and a stale
//! entry is simply overwritten by the next successful fetch. Caching is
//! strictly best-effort: no condition in here ever turns a successful
//! request into a failed one.

mod key;
mod wire;

pub use key::compute_key;

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

use crate::transport::{BoxTransport, CACHE_TTL, Interceptor, Request, Response};

/// Why a read did not produce a usable entry. Every variant means the same
/// thing to the pipeline (fall through to a live request), but the
/// distinction is kept for logs and tests.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("cache entry expired")]
    Expired,

    #[error("cache entry unreadable: {0}")]
    Unreadable(io::Error),

    #[error("cache entry malformed")]
    Malformed,
}

/// A parsed cache entry. The stored response was serialized without a
/// request association; `into_response` rebinds it to the request being
/// answered.
pub struct Entry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Entry {
    pub fn into_response(self, url: Url) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            url,
            body: Box::new(Cursor::new(self.body)),
        }
    }
}

/// The store. One coarse reader/writer lock guards all of it: reads share,
/// writes exclude. Concurrent fetches of different keys serialize on disk
/// I/O but cannot corrupt state; identical concurrent misses both fetch
/// and both write, last writer wins.
pub struct Store {
    root: PathBuf,
    default_ttl: Duration,
    lock: RwLock<()>,
}

impl Store {
    pub fn new(root: PathBuf, default_ttl: Duration) -> Self {
        Self {
            root,
            default_ttl,
            lock: RwLock::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// GET and HEAD are always cacheable. POST only against a GraphQL
    /// endpoint path: GraphQL reads arrive as POSTs, and the path is all
    /// the information available at this layer. A mutation POSTed there is
    /// cached too; known limitation, the query is not inspected.
    pub fn request_cacheable(request: &Request) -> bool {
        if request.method == Method::GET || request.method == Method::HEAD {
            return true;
        }
        request.method == Method::POST && is_graphql_path(request.url.path())
    }

    /// Anything below 500 except 403: negative results ("not found") are
    /// worth keeping, gateway errors and explicit denials are always
    /// re-fetched.
    pub fn response_cacheable(response: &Response) -> bool {
        response.status.as_u16() < 500 && response.status != StatusCode::FORBIDDEN
    }

    /// Fetch and parse an entry, enforcing the TTL against the file's
    /// modification time.
    pub fn read(&self, key: &str, ttl: Duration) -> Result<Entry, CacheError> {
        let path = self.entry_path(key);
        let _shared = self.lock.read();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::Miss);
            }
            Err(error) => return Err(CacheError::Unreadable(error)),
        };
        let modified = metadata.modified().map_err(CacheError::Unreadable)?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age > ttl {
            return Err(CacheError::Expired);
        }

        let bytes = fs::read(&path).map_err(CacheError::Unreadable)?;
        wire::parse(&bytes).ok_or(CacheError::Malformed)
    }

    /// Wrap a live response so its bytes are copied into the cache as the
    /// caller reads them. The entry is written only after a clean EOF; a
    /// body dropped halfway is never persisted.
    pub fn capture(self: Arc<Self>, key: String, response: Response) -> Response {
        let Response {
            status,
            headers,
            url,
            body,
        } = response;
        Response {
            status,
            headers: headers.clone(),
            url,
            body: Box::new(RecordingBody {
                inner: body,
                store: self,
                key,
                status,
                headers,
                copied: Vec::new(),
                finished: false,
            }),
        }
    }

    fn write_entry(
        &self,
        key: &str,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) -> io::Result<()> {
        let path = self.entry_path(key);
        let _exclusive = self.lock.write();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, wire::serialize(status, headers, body))
    }

    /// `<root>/aa/bb/rest…` to bound directory fan-out; keys shorter than
    /// six characters are stored unsharded.
    fn entry_path(&self, key: &str) -> PathBuf {
        if key.len() >= 6 {
            self.root
                .join(&key[..2])
                .join(&key[2..4])
                .join(&key[4..])
        } else {
            self.root.join(key)
        }
    }
}

fn is_graphql_path(path: &str) -> bool {
    path == "/graphql" || path == "/api/graphql"
}

/// Tee reader backing [`Store::capture`]. Write failures are logged and
/// swallowed; the caller keeps reading the live body either way.
struct RecordingBody {
    inner: Box<dyn Read + Send>,
    store: Arc<Store>,
    key: String,
    status: StatusCode,
    headers: HeaderMap,
    copied: Vec<u8>,
    finished: bool,
}

impl Read for RecordingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.copied.extend_from_slice(&buf[..n]);
        } else if !buf.is_empty() && !self.finished {
            self.finished = true;
            if let Err(error) =
                self.store
                    .write_entry(&self.key, self.status, &self.headers, &self.copied)
            {
                debug!(key = %self.key, %error, "cache write failed");
            }
        }
        Ok(n)
    }
}

/// Serve cacheable requests from the store; misses call through and are
/// captured on the way back. Miss, expiry, and unreadable entries all fall
/// through silently; the caller never sees a cache condition as an error.
pub fn cache_responses(store: Arc<Store>) -> Interceptor {
    Box::new(move |inner: BoxTransport| -> BoxTransport {
        Box::new(move |mut request: Request| {
            if !Store::request_cacheable(&request) {
                return inner.execute(request);
            }

            let key = match compute_key(&mut request) {
                Ok(key) => key,
                Err(error) => {
                    debug!(%error, "cache key unavailable, passing through");
                    return inner.execute(request);
                }
            };

            let ttl = request_ttl(&request).unwrap_or(store.default_ttl);
            match store.read(&key, ttl) {
                Ok(entry) => {
                    debug!(key = %key, "cache hit");
                    return Ok(entry.into_response(request.url.clone()));
                }
                Err(CacheError::Miss) => {}
                Err(error) => debug!(key = %key, %error, "cache bypass"),
            }

            let response = inner.execute(request)?;
            if Store::response_cacheable(&response) {
                Ok(Arc::clone(&store).capture(key, response))
            } else {
                Ok(response)
            }
        })
    })
}

/// Per-request TTL hint, integer seconds.
fn request_ttl(request: &Request) -> Option<Duration> {
    request
        .header_str(&CACHE_TTL)
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
