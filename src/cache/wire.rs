//! Verbatim HTTP/1.x serialization for cache entries.
//!
//! An entry on disk reads exactly like a response written to a socket:
//! status line, header block, blank line, body. No custom framing,
//! compression, or checksum.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::Entry;

pub(crate) fn serialize(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 256);
    let reason = status.canonical_reason().unwrap_or("");
    out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", status.as_u16(), reason).as_bytes());
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

/// Parse an entry back. Individually unparseable header lines are skipped;
/// a missing or mangled status line rejects the whole entry.
pub(crate) fn parse(bytes: &[u8]) -> Option<Entry> {
    let split = bytes.windows(4).position(|window| window == b"\r\n\r\n")?;
    let head = std::str::from_utf8(&bytes[..split]).ok()?;
    let body = bytes[split + 4..].to_vec();

    let mut lines = head.split("\r\n");
    let status_line = lines.next()?;
    let mut parts = status_line.splitn(3, ' ');
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    let code: u16 = parts.next()?.parse().ok()?;
    let status = StatusCode::from_u16(code).ok()?;

    let mut headers = HeaderMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let Ok(name) = HeaderName::from_bytes(name.trim().as_bytes()) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value.trim_start()) else {
            continue;
        };
        headers.append(name, value);
    }

    Some(Entry {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn test_serialized_entry_parses_back() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-oauth-scopes", HeaderValue::from_static("repo, read:org"));

        let bytes = serialize(StatusCode::NOT_FOUND, &headers, b"{\"message\":\"gone\"}");
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let entry = parse(&bytes).unwrap();
        assert_eq!(entry.status, StatusCode::NOT_FOUND);
        assert_eq!(entry.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(
            entry.headers.get("x-oauth-scopes").unwrap(),
            "repo, read:org"
        );
        assert_eq!(entry.body, b"{\"message\":\"gone\"}");
    }

    #[test]
    fn test_body_may_contain_the_separator() {
        let bytes = serialize(StatusCode::OK, &HeaderMap::new(), b"a\r\n\r\nb");
        let entry = parse(&bytes).unwrap();
        assert_eq!(entry.body, b"a\r\n\r\nb");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse(b"not an http response").is_none());
        assert!(parse(b"GARBAGE 200 OK\r\n\r\nbody").is_none());
        assert!(parse(b"HTTP/1.1 nope OK\r\n\r\nbody").is_none());
    }

    #[test]
    fn test_unparseable_header_lines_are_skipped() {
        let bytes = b"HTTP/1.1 200 OK\r\nvalid: yes\r\nno separator here\r\n\r\nbody";
        let entry = parse(bytes).unwrap();
        assert_eq!(entry.headers.get("valid").unwrap(), "yes");
        assert_eq!(entry.headers.len(), 1);
        assert_eq!(entry.body, b"body");
    }
}
