pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod transport;

pub use api::{ApiError, Client, GraphQlErrorResponse, HttpError, ScopeSet};
pub use cache::Store;
pub use config::Settings;
pub use transport::{Body, Request, Response, Transport, TransportError};
