//! MCP server handler implementation.
//!
//! This module defines the shared server state and the handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGenerationsParams, CacheGetParams, generations_impl, get_impl};
use crate::tools::sw_fetch::{SwFetchParams, fetch_impl};
use crate::tools::sw_update::{SwUpdateParams, update_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tether_client::{FetchClient, FetchConfig, HeadlessHost, Registration, ServiceWorker};
use tether_core::{AppConfig, CacheDb, CacheStore, Error};
use url::Url;

/// Everything the tools share: configuration, the store, the network and
/// the registration holding the active worker.
pub struct ServerState {
    pub config: AppConfig,
    pub origin: Url,
    pub db: CacheDb,
    pub network: Arc<FetchClient>,
    pub registration: Registration,
}

impl ServerState {
    pub fn new(config: AppConfig, db: CacheDb) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
        let registration = Registration::new(network.clone());
        Ok(Self { config, origin, db, network, registration })
    }

    /// Build a worker for `config` over this server's store and network.
    pub fn worker(&self, config: &AppConfig) -> Result<ServiceWorker, Error> {
        let store: Arc<dyn CacheStore> = Arc::new(self.db.clone());
        ServiceWorker::from_config(config, store, self.network.clone(), Arc::new(HeadlessHost))
    }

    /// Activate the configured version, installing it unless a previous
    /// run already did.
    pub async fn start_configured(&self) -> Result<(), Error> {
        let worker = self.worker(&self.config)?;
        let report = self.registration.start(worker).await?;
        tracing::info!(
            version = %self.config.version,
            evicted = report.eviction.deleted.len(),
            "worker active"
        );
        Ok(())
    }
}

/// The main MCP server handler for tether.
#[derive(Clone)]
pub struct TetherServer {
    state: Arc<ServerState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl TetherServer {
    /// Create a new server handler.
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Route a request through the active worker.
    #[tool(
        description = "Fetch a URL through the offline worker. Returns the response with its source: network, cache, offline placeholder or passthrough."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    /// Install a generation under a new version label and activate it.
    #[tool(
        description = "Install the asset manifest under a version label and activate it, evicting every other cache generation."
    )]
    async fn sw_update(&self, params: Parameters<SwUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&self.state, params.0).await
    }

    #[tool(description = "List cache generations and the version label of the active worker.")]
    async fn cache_generations(&self, params: Parameters<CacheGenerationsParams>) -> Result<CallToolResult, McpError> {
        generations_impl(&self.state, params.0).await
    }

    #[tool(description = "Look up the newest cached response for a URL across all generations.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state, params.0).await
    }
}

impl ServerHandler for TetherServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "tether-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
