//! Typed errors for failed API calls.
//!
//! Transport-level failures (could not reach the server) and
//! application-level failures (the server answered with an error) stay
//! distinct variants so callers can choose a retry policy. GraphQL
//! responses carrying an `errors` array are failures by policy, even next
//! to partial data on a 200.

use std::fmt;
use std::io::Read;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use super::scopes::ScopeSet;
use crate::transport::{ACCEPTED_OAUTH_SCOPES, OAUTH_SCOPES, Response, TransportError};

/// Any failure surfaced by the API facade.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Http(HttpError),

    #[error("{0}")]
    GraphQl(GraphQlErrorResponse),

    #[error("error parsing response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// A non-2xx response, classified.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub url: Url,
    pub message: String,
    /// Set when the failure looks like a missing-scope 404; names the
    /// missing scopes and how to request them.
    pub scopes_suggestion: Option<String>,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "HTTP {} ({})", self.status.as_u16(), self.url)
        } else {
            write!(
                f,
                "HTTP {}: {} ({})",
                self.status.as_u16(),
                self.message,
                self.url
            )
        }
    }
}

impl std::error::Error for HttpError {}

/// One error from a GraphQL response.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

/// GraphQL error paths mix field names and list indices.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(u64),
}

impl GraphQlError {
    /// Dotted rendering of the error path; empty when the server sent
    /// none.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match segment {
                PathSegment::Field(name) => out.push_str(name),
                PathSegment::Index(index) => out.push_str(&index.to_string()),
            }
        }
        out
    }
}

/// Every error in a GraphQL response, aggregated in encounter order and
/// never truncated to the first.
#[derive(Debug, Clone)]
pub struct GraphQlErrorResponse {
    pub errors: Vec<GraphQlError>,
}

impl fmt::Display for GraphQlErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .errors
            .iter()
            .map(|error| {
                let path = error.path_string();
                if path.is_empty() {
                    error.message.clone()
                } else {
                    format!("{} ({})", error.message, path)
                }
            })
            .collect();
        write!(f, "GraphQL: {}", rendered.join(", "))
    }
}

impl std::error::Error for GraphQlErrorResponse {}

/// Classify a non-2xx response. The message comes from a JSON `message`
/// field when the body has one, else the raw body text, else the status
/// reason. Never fails: a body that cannot be read becomes the message.
pub fn classify(mut response: Response) -> HttpError {
    let scopes_suggestion = scopes_suggestion(&response);
    let status = response.status;
    let url = response.url.clone();

    let mut body = Vec::new();
    let message = match response.body.read_to_end(&mut body) {
        Ok(_) => extract_message(&body, status),
        Err(error) => error.to_string(),
    };

    HttpError {
        status,
        url,
        message,
        scopes_suggestion,
    }
}

fn extract_message(body: &[u8], status: StatusCode) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        if let Some(message) = parsed.message {
            if !message.is_empty() {
                return message;
            }
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("").to_string()
    } else {
        text
    }
}

/// Remediation hint for a 404 that is plausibly a scope problem: the
/// endpoint advertised required scopes and the token is missing at least
/// one of them. Other statuses never get the hint.
fn scopes_suggestion(response: &Response) -> Option<String> {
    if response.status != StatusCode::NOT_FOUND {
        return None;
    }
    let required = ScopeSet::parse(response.header_str(&ACCEPTED_OAUTH_SCOPES));
    if required.is_empty() {
        return None;
    }
    let granted = ScopeSet::parse(response.header_str(&OAUTH_SCOPES));
    let missing = required.missing_from(&granted);
    if missing.is_empty() {
        return None;
    }

    let noun = if missing.len() == 1 { "scope" } else { "scopes" };
    Some(format!(
        "This API operation needs the {} {noun}. To request it, run:  forge auth refresh -s {}",
        missing.join(", "),
        missing.join(","),
    ))
}
