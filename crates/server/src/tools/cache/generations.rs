//! cache_generations tool implementation.
//!
//! Lists the cache generations present and which version is active.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_core::CacheStore;

use crate::handler::ServerState;
use crate::tools::json_result;

/// Parameters for the cache_generations tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsParams {}

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// Version label of the active worker, if one is active.
    pub active: Option<String>,
    /// Version label from configuration.
    pub configured: String,
    /// Generation names, oldest first.
    pub generations: Vec<String>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(
    state: &ServerState, _params: CacheGenerationsParams,
) -> Result<CallToolResult, McpError> {
    let generations = state.db.generations().await?;
    let active = state.registration.active().await.map(|w| w.version().to_string());

    let output = CacheGenerationsOutput { active, configured: state.config.version.clone(), generations };
    json_result(&output)
}
