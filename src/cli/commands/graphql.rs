//! `forge graphql`: issue a GraphQL request and pretty-print the data.

use std::fs;

use anyhow::Context;
use reqwest::header::HeaderValue;

use super::{CommandError, warn_missing_scope};
use crate::api::Client;
use crate::config::Settings;
use crate::transport::CACHE_TTL;

pub fn run(
    settings: &Settings,
    query: &str,
    fields: &[String],
    cache: Option<u64>,
) -> Result<(), CommandError> {
    let query = match query.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
        }
        None => query.to_string(),
    };

    let mut variables = serde_json::Map::new();
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            return Err(CommandError::Usage(format!(
                "invalid field (expected `key=value`): {field}"
            )));
        };
        variables.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    let client = Client::from_settings(settings, warn_missing_scope)
        .map_err(crate::api::ApiError::from)?;
    let mut request = client.graphql_request(&query, &variables)?;
    if let Some(seconds) = cache {
        request.headers.insert(CACHE_TTL, HeaderValue::from(seconds));
    }

    let data: serde_json::Value = client.graphql_execute(request)?;
    let rendered = serde_json::to_string_pretty(&data).map_err(crate::api::ApiError::from)?;
    println!("{rendered}");
    Ok(())
}
