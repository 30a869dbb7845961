//! `forge api`: issue a REST request and stream the response body to
//! stdout.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};

use super::{CommandError, warn_missing_scope};
use crate::api::Client;
use crate::config::Settings;
use crate::transport::{Body, CACHE_TTL};

#[allow(clippy::too_many_arguments)]
pub fn run(
    settings: &Settings,
    endpoint: &str,
    method: &str,
    headers: &[String],
    input: Option<&Path>,
    cache: Option<u64>,
    include: bool,
) -> Result<(), CommandError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CommandError::Usage(format!("invalid HTTP method: {method}")))?;

    let body = match input {
        None => Body::Empty,
        Some(path) if path == Path::new("-") => Body::Reader(Box::new(io::stdin())),
        Some(path) => Body::Bytes(
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        ),
    };

    let client = Client::from_settings(settings, warn_missing_scope)
        .map_err(crate::api::ApiError::from)?;
    let mut request = client
        .rest_request(method, endpoint, body)
        .map_err(crate::api::ApiError::from)?;

    for header in headers {
        let (name, value) = parse_header(header)?;
        request.headers.insert(name, value);
    }
    if let Some(seconds) = cache {
        request.headers.insert(CACHE_TTL, HeaderValue::from(seconds));
    }

    let mut response = client.request(request)?;
    if let Some(scopes) = client.granted_scopes() {
        tracing::debug!(%scopes, "token scopes reported by the server");
    }

    if include {
        let reason = response.status.canonical_reason().unwrap_or("");
        println!("HTTP/1.1 {} {}", response.status.as_u16(), reason);
        for (name, value) in &response.headers {
            println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }

    let mut stdout = io::stdout().lock();
    io::copy(&mut response.body, &mut stdout).context("failed to stream response body")?;
    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), CommandError> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(CommandError::Usage(format!(
            "invalid header (expected `name: value`): {raw}"
        )));
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| CommandError::Usage(format!("invalid header name: {name}")))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| CommandError::Usage(format!("invalid header value for {name}")))?;
    Ok((name, value))
}
