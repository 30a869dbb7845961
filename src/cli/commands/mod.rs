//! Command implementations, one module per subcommand.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod graphql;
pub mod init;

use thiserror::Error;

use crate::api::ApiError;

/// Failures a command can hand back to `main`.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One-time warning wired into the pipeline's scope check.
pub(crate) fn warn_missing_scope(client_id: &str) {
    if client_id.is_empty() {
        eprintln!(
            "warning: your token is missing the `read:org` scope; \
             run `forge auth refresh -s read:org` to see how to request it"
        );
    } else {
        eprintln!(
            "warning: the token issued to OAuth app {client_id} is missing the `read:org` scope; \
             run `forge auth refresh -s read:org` to see how to request it"
        );
    }
}
