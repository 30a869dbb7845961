//! Request executor facade: endpoint resolution, pipeline assembly, and
//! response decoding for REST and GraphQL calls.

use std::io::Read;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::{ApiError, GraphQlError, GraphQlErrorResponse, classify};
use crate::cache;
use crate::config::Settings;
use crate::transport::{
    Body, BoxTransport, HttpTransport, Interceptor, OAUTH_SCOPES, Request, Response, TokenSource,
    TransportError, add_auth_header, add_cache_ttl_header, check_scopes, compose, extract_header,
    sanitize_controls,
};

/// Hostname of the hosted Forge service; self-managed deployments use
/// their own.
pub const DEFAULT_HOST: &str = "forge.dev";

/// Scope the CLI's own metadata queries need. Responses missing it
/// trigger the one-time warning.
const REQUIRED_TOKEN_SCOPE: &str = "read:org";

/// Facade over a composed transport pipeline.
pub struct Client {
    transport: BoxTransport,
    host: String,
    granted_scopes: Arc<Mutex<Option<String>>>,
}

impl Client {
    /// Assemble the conventional interceptor stack around a live HTTP
    /// executor: scope check, scope extraction, sanitizer, cache (when
    /// enabled), auth injection, TTL hint.
    pub fn from_settings<W>(settings: &Settings, warn_missing_scope: W) -> Result<Self, TransportError>
    where
        W: Fn(&str) + Send + Sync + 'static,
    {
        let base: BoxTransport = Box::new(HttpTransport::new()?);
        let granted_scopes = Arc::new(Mutex::new(None));

        let token = settings.resolved_token();
        let tokens: Arc<dyn TokenSource> = Arc::new(move |_host: &str| token.clone());

        let mut layers: Vec<Interceptor> = vec![
            check_scopes(REQUIRED_TOKEN_SCOPE, warn_missing_scope),
            extract_header(OAUTH_SCOPES, Arc::clone(&granted_scopes)),
            sanitize_controls(),
        ];
        if settings.cache.enabled {
            let store = cache::Store::new(settings.cache.directory(), settings.cache.ttl());
            layers.push(cache::cache_responses(Arc::new(store)));
        }
        layers.push(add_auth_header(tokens));
        layers.push(add_cache_ttl_header(settings.cache.ttl()));

        Ok(Self {
            transport: compose(base, layers),
            host: settings.host.clone(),
            granted_scopes,
        })
    }

    /// Wrap an existing executor. Used by tests and callers composing
    /// their own stack.
    pub fn with_transport(transport: BoxTransport, host: impl Into<String>) -> Self {
        Self {
            transport,
            host: host.into(),
            granted_scopes: Arc::new(Mutex::new(None)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Scopes granted to the token, as reported by the most recent
    /// response that carried the header.
    pub fn granted_scopes(&self) -> Option<String> {
        self.granted_scopes.lock().clone()
    }

    /// Execute a request and classify the outcome. Success responses
    /// stream through untouched.
    pub fn request(&self, request: Request) -> Result<Response, ApiError> {
        let response = self.transport.execute(request)?;
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Http(classify(response)))
        }
    }

    /// Build a REST request against this client's host with JSON defaults.
    /// Headers set here are defaults; callers override after.
    pub fn rest_request(
        &self,
        method: Method,
        path: &str,
        body: Body,
    ) -> Result<Request, TransportError> {
        let url = rest_endpoint(&self.host, path)?;
        let mut request = Request::new(method, url);
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !body.is_empty() {
            request.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            );
        }
        request.body = body;
        Ok(request)
    }

    /// REST call decoding the response as JSON. A 204 decodes as `null`.
    pub fn rest<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let body = match payload {
            Some(value) => Body::Bytes(serde_json::to_vec(value)?),
            None => Body::Empty,
        };
        let request = self.rest_request(method, path, body)?;
        let mut response = self.request(request)?;

        if response.status == StatusCode::NO_CONTENT {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }

        let mut bytes = Vec::new();
        response
            .body
            .read_to_end(&mut bytes)
            .map_err(TransportError::from)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Build the standard GraphQL POST for this client's host.
    pub fn graphql_request(
        &self,
        query: &str,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Request, ApiError> {
        let payload = serde_json::json!({
            "query": query,
            "variables": variables,
        });
        let url = graphql_endpoint(&self.host)?;
        let mut request = Request::new(Method::POST, url);
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        request.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        request.body = Body::Bytes(serde_json::to_vec(&payload)?);
        Ok(request)
    }

    /// Execute a GraphQL request and decode its envelope. Any entry in the
    /// `errors` array fails the call, even alongside data on a 200.
    pub fn graphql_execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let mut response = self.request(request)?;
        let mut bytes = Vec::new();
        response
            .body
            .read_to_end(&mut bytes)
            .map_err(TransportError::from)?;

        let envelope: GraphQlEnvelope = serde_json::from_slice(&bytes)?;
        if !envelope.errors.is_empty() {
            return Err(ApiError::GraphQl(GraphQlErrorResponse {
                errors: envelope.errors,
            }));
        }
        Ok(serde_json::from_value(envelope.data)?)
    }

    /// GraphQL call: serialize, execute, decode.
    pub fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<T, ApiError> {
        let request = self.graphql_request(query, variables)?;
        self.graphql_execute(request)
    }
}

#[derive(Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// REST endpoint for a host. The hosted service is served from its `api.`
/// subdomain; self-managed deployments expose the API under `/api/v3/`.
/// Absolute URLs pass through untouched.
pub fn rest_endpoint(host: &str, path: &str) -> Result<Url, TransportError> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return parse_url(path);
    }
    let path = path.trim_start_matches('/');
    if is_hosted(host) {
        parse_url(&format!("https://api.{DEFAULT_HOST}/{path}"))
    } else {
        parse_url(&format!("https://{host}/api/v3/{path}"))
    }
}

/// GraphQL endpoint for a host: `/graphql` on the hosted service,
/// `/api/graphql` on self-managed deployments.
pub fn graphql_endpoint(host: &str) -> Result<Url, TransportError> {
    if is_hosted(host) {
        parse_url(&format!("https://api.{DEFAULT_HOST}/graphql"))
    } else {
        parse_url(&format!("https://{host}/api/graphql"))
    }
}

fn is_hosted(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == DEFAULT_HOST || host == format!("api.{DEFAULT_HOST}")
}

fn parse_url(raw: &str) -> Result<Url, TransportError> {
    Url::parse(raw).map_err(|error| TransportError::InvalidRequest(error.to_string()))
}
