//! sw_fetch tool implementation.
//!
//! Routes a request through the active worker, or straight to the network
//! when no worker is active, and reports where the response came from.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_client::{Destination, FetchRequest, fetch::resolve};
use tether_core::Error;

use super::{json_result, parse_method};
use crate::handler::ServerState;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination as a Sec-Fetch-Dest value (default: "document").
    /// Only "document" requests receive the offline placeholder.
    #[serde(default = "default_destination")]
    pub destination: String,
}

fn default_method() -> String {
    "GET".into()
}

fn default_destination() -> String {
    "document".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The canonical request URL.
    pub url: String,
    /// The final URL after redirects, if the response came from a server.
    pub final_url: Option<String>,
    /// Where the response came from: network, cache, offline or passthrough.
    pub source: String,
    pub status: u16,
    pub status_text: String,
    /// basic, cors, opaque or default.
    pub response_type: String,
    pub content_type: Option<String>,
    /// Header pairs in response order; repeated headers appear once per value.
    pub headers: Vec<(String, String)>,
    /// Response body, lossily decoded as UTF-8.
    pub body: String,
    /// ISO8601 timestamp of delivery.
    pub fetched_at: String,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(state: &ServerState, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(&state.origin, params.url.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = parse_method(&params.method)?;
    let request = FetchRequest::new(method, url).with_destination(Destination::from_fetch_dest(&params.destination));

    let delivery = state.registration.fetch(&request).await?;
    let response = delivery.response;

    let headers = response
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).to_string()))
        .collect();

    let output = SwFetchOutput {
        url: request.canonical_url().to_string(),
        final_url: response.url.as_ref().map(|u| u.to_string()),
        source: delivery.source.as_str().to_string(),
        status: response.status.as_u16(),
        status_text: response.status_text.clone(),
        response_type: response.response_type.as_str().to_string(),
        content_type: response.content_type().map(|s| s.to_string()),
        headers,
        body: response.body_text(),
        fetched_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;
    use tether_core::{AppConfig, CacheDb};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn state_for(origin: &str) -> ServerState {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig { origin: origin.into(), precache: vec!["/".into()], ..Default::default() };
        ServerState::new(config, db).unwrap()
    }

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: default_method(), destination: default_destination() }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let state = state_for("http://localhost:3000").await;
        assert!(fetch_impl(&state, params("  ")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_bad_method() {
        let state = state_for("http://localhost:3000").await;
        let params = SwFetchParams { method: "NOT VALID".into(), ..params("/") };
        assert!(fetch_impl(&state, params).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_without_worker_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("live")
                    .append_header("set-cookie", "a=1")
                    .append_header("set-cookie", "b=2"),
            )
            .mount(&server)
            .await;

        let state = state_for(&server.uri()).await;
        let result = fetch_impl(&state, params("/programs")).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.source, "passthrough");
        assert_eq!(out.status, 200);
        assert_eq!(out.body, "live");

        let cookies: Vec<&str> =
            out.headers.iter().filter(|(name, _)| name == "set-cookie").map(|(_, v)| v.as_str()).collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[tokio::test]
    async fn test_fetch_through_worker_then_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
            .mount(&server)
            .await;

        let state = state_for(&server.uri()).await;
        state.start_configured().await.unwrap();

        let out: SwFetchOutput = output(&fetch_impl(&state, params("/")).await.unwrap());
        assert_eq!(out.source, "network");
        assert_eq!(out.response_type, "basic");

        drop(server);

        let out: SwFetchOutput = output(&fetch_impl(&state, params("/")).await.unwrap());
        assert_eq!(out.source, "cache");
        assert_eq!(out.body, "<html>home</html>");

        let out: SwFetchOutput = output(&fetch_impl(&state, params("/settings")).await.unwrap());
        assert_eq!(out.source, "offline");
        assert_eq!(out.status, 503);

        let script = SwFetchParams { destination: "script".into(), ..params("/chunk.js") };
        assert!(fetch_impl(&state, script).await.is_err());
    }
}
