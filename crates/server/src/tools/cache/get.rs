//! cache_get tool implementation.
//!
//! Retrieves the newest cached response for a URL, searching every
//! generation the way the worker's fallback does.

use chrono::DateTime;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_client::{FetchRequest, fetch::resolve};
use tether_core::{CacheStore, Error};

use crate::handler::ServerState;
use crate::tools::{json_result, parse_method};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method the entry was stored under (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Restrict the lookup to one generation.
    #[serde(default)]
    pub generation: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub status_text: String,
    /// Header pairs as stored; repeated headers appear once per value.
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// ISO8601 timestamp of when the entry was written.
    pub stored_at: Option<String>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &ServerState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&state.origin, params.url.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = FetchRequest::new(parse_method(&params.method)?, url);
    let key = request.cache_key();

    let entry = state
        .db
        .lookup(&key, params.generation.as_deref())
        .await?
        .ok_or_else(|| Error::CacheMiss(request.canonical_url().to_string()))?;

    let output = CacheGetOutput {
        stored_at: DateTime::from_timestamp_micros(entry.stored_at).map(|t| t.to_rfc3339()),
        body: String::from_utf8_lossy(&entry.body).to_string(),
        headers: entry.headers,
        key: entry.key,
        url: entry.url,
        method: entry.method,
        status: entry.status,
        status_text: entry.status_text,
    };

    json_result(&output)
}
