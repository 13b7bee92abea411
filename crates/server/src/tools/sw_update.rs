//! sw_update tool implementation.
//!
//! Installs the asset manifest under a version label and, if that
//! succeeds, makes the new worker active and evicts other generations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_core::{AppConfig, Error};

use super::json_result;
use crate::handler::ServerState;

/// Input parameters for sw_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwUpdateParams {
    /// Version label for the new generation.
    pub version: String,

    /// Asset manifest override (default: the configured manifest).
    #[serde(default)]
    pub precache: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailedEviction {
    pub generation: String,
    pub reason: String,
}

/// Output structure for sw_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwUpdateOutput {
    /// Version now active.
    pub version: String,
    /// Version that was active before, if any.
    pub previous: Option<String>,
    /// Generations deleted on activation.
    pub evicted: Vec<String>,
    /// Generations that could not be deleted.
    pub failed: Vec<FailedEviction>,
    pub clients_claimed: usize,
}

/// Implementation of the sw_update tool.
pub async fn update_impl(state: &ServerState, params: SwUpdateParams) -> Result<CallToolResult, McpError> {
    let config = AppConfig {
        version: params.version.trim().to_string(),
        precache: params.precache.unwrap_or_else(|| state.config.precache.clone()),
        ..state.config.clone()
    };
    config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

    let previous = state.registration.active().await.map(|w| w.version().to_string());
    let worker = state.worker(&config)?;
    let report = state.registration.update(worker).await?;

    let output = SwUpdateOutput {
        version: config.version,
        previous,
        evicted: report.eviction.deleted,
        failed: report
            .eviction
            .failed
            .into_iter()
            .map(|(generation, reason)| FailedEviction { generation, reason })
            .collect(),
        clients_claimed: report.clients_claimed,
    };

    json_result(&output)
}
