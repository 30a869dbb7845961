//! Deterministic request digests for cache addressing.

use std::io;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use sha2::{Digest, Sha256};

use crate::transport::Request;

/// SHA-256 over method, URL, Accept, Authorization, and the body. Two
/// requests agreeing on those five fields are cache-equivalent no matter
/// what other headers differ. A streaming body is buffered in place, so
/// the next stage still reads every byte it would have read anyway.
pub fn compute_key(request: &mut Request) -> io::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(request.method.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(request.url.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(request.header_str(ACCEPT).as_bytes());
    hasher.update(b":");
    hasher.update(request.header_str(AUTHORIZATION).as_bytes());
    hasher.update(b":");
    hasher.update(request.body.buffer()?);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Body;
    use reqwest::header::HeaderValue;
    use reqwest::{Method, Url};
    use std::io::Cursor;

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn test_identical_requests_share_a_key() {
        let mut a = request(Method::GET, "https://api.forge.dev/repos");
        let mut b = request(Method::GET, "https://api.forge.dev/repos");
        assert_eq!(compute_key(&mut a).unwrap(), compute_key(&mut b).unwrap());
    }

    #[test]
    fn test_each_keyed_field_changes_the_digest() {
        let mut base = request(Method::GET, "https://api.forge.dev/repos");
        let base_key = compute_key(&mut base).unwrap();

        let mut other_method = request(Method::HEAD, "https://api.forge.dev/repos");
        assert_ne!(compute_key(&mut other_method).unwrap(), base_key);

        let mut other_url = request(Method::GET, "https://api.forge.dev/issues");
        assert_ne!(compute_key(&mut other_url).unwrap(), base_key);

        let mut other_accept = request(Method::GET, "https://api.forge.dev/repos");
        other_accept
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert_ne!(compute_key(&mut other_accept).unwrap(), base_key);

        let mut other_auth = request(Method::GET, "https://api.forge.dev/repos");
        other_auth
            .headers
            .insert(AUTHORIZATION, HeaderValue::from_static("token x"));
        assert_ne!(compute_key(&mut other_auth).unwrap(), base_key);

        let mut other_body = request(Method::GET, "https://api.forge.dev/repos");
        other_body.body = Body::Bytes(b"{}".to_vec());
        assert_ne!(compute_key(&mut other_body).unwrap(), base_key);
    }

    #[test]
    fn test_unrelated_headers_do_not_affect_the_key() {
        let mut plain = request(Method::GET, "https://api.forge.dev/repos");
        let mut decorated = request(Method::GET, "https://api.forge.dev/repos");
        decorated
            .headers
            .insert("x-request-id", HeaderValue::from_static("abc"));
        assert_eq!(
            compute_key(&mut plain).unwrap(),
            compute_key(&mut decorated).unwrap()
        );
    }

    #[test]
    fn test_streamed_body_survives_hashing() {
        let mut request = request(Method::POST, "https://api.forge.dev/graphql");
        request.body = Body::Reader(Box::new(Cursor::new(b"{\"query\":\"{ viewer }\"}".to_vec())));
        compute_key(&mut request).unwrap();
        // The body was read for hashing but the bytes are still there for
        // the executor.
        assert_eq!(
            request.body.buffer().unwrap(),
            b"{\"query\":\"{ viewer }\"}"
        );
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let mut request = request(Method::GET, "https://api.forge.dev/repos");
        let key = compute_key(&mut request).unwrap();
        assert_eq!(key.len(), 64);
        assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
