//! MCP tool implementations.
//!
//! This module contains all tools exposed by the tether server.

pub mod cache;
pub mod sw_fetch;
pub mod sw_update;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use tether_core::Error;

/// Wrap a tool's output as pretty-printed JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Parse a method name the way a request line would carry it.
pub(crate) fn parse_method(method: &str) -> Result<reqwest::Method, Error> {
    reqwest::Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;

    /// Decode the JSON text payload of a tool result.
    pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
