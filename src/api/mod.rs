//! API facade: the thin callers that serialize a query or payload, run it
//! through the transport pipeline, and decode the result.

pub mod client;
pub mod error;
pub mod scopes;

pub use client::{Client, DEFAULT_HOST, graphql_endpoint, rest_endpoint};
pub use error::{ApiError, GraphQlError, GraphQlErrorResponse, HttpError, PathSegment, classify};
pub use scopes::ScopeSet;
