//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::host::HostState;
use crate::tools::cache::{CacheKeysParams, keys_impl};
use crate::tools::worker::{
    SwClientsParams, SwFetchParams, SwMessageParams, SwRegisterParams, clients_impl, fetch_impl, message_impl,
    register_impl, status_impl,
};

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

/// The main MCP server handler for shelter.
#[derive(Clone)]
pub struct ShelterServer {
    tool_router: ToolRouter<Self>,
    host: Arc<HostState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShelterServer {
    /// Create a new server handler over a shared host.
    pub fn new(host: Arc<HostState>) -> Self {
        Self { tool_router: Self::tool_router(), host }
    }

    #[tool(
        description = "Install a new offline cache version from configuration. It precaches the essential pages and takes control when no open page holds the current version."
    )]
    async fn sw_register(&self, params: Parameters<SwRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.host, params.0).await
    }

    /// Route a request through the active version.
    ///
    /// Same-origin GETs are answered from the cache when possible and cached
    /// on success; failed navigations fall back to the offline page.
    #[tool(
        description = "Issue a request from a page. Returns status, headers, body and where the response came from: cache, network, offline or passthrough."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, params.0).await
    }

    #[tool(description = "Post a message to the waiting or active version. The string \"skipWaiting\" activates a waiting version.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.host, params.0).await
    }

    #[tool(description = "Open or close a page on the origin. Open pages keep a waiting version from activating.")]
    async fn sw_clients(&self, params: Parameters<SwClientsParams>) -> Result<CallToolResult, McpError> {
        clients_impl(&self.host, params.0).await
    }

    #[tool(description = "Report active and waiting versions, open pages and cache stores with entry counts.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.host).await
    }

    #[tool(description = "List the URLs cached in a store. Defaults to the active version's store.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.host, params.0).await
    }
}

impl ServerHandler for ShelterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shelter".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!("Offline cache manager for {}", self.host.config.origin)),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::host;

    #[tokio::test]
    async fn test_all_tools_listed() {
        let (host, _network) = host().await;
        let server = ShelterServer::new(host);

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        assert_eq!(names, ["cache_keys", "sw_clients", "sw_fetch", "sw_message", "sw_register", "sw_status"]);
    }
}
