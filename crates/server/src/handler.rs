//! MCP server handler implementation.
//!
//! The MCP client plays the host: it delivers lifecycle events and
//! intercepted requests as tool calls, which this handler routes to the agent.
use std::sync::Arc;

use crate::tools::cache::get::{CacheGetParams, get_impl};
use crate::tools::cache::keys::keys_impl;
use crate::tools::agent_fetch::{AgentFetchParams, fetch_impl};
use crate::tools::lifecycle::{AgentActivateParams, AgentMessageParams, activate_impl, install_impl, message_impl};

use offline_client::Agent;
use offline_core::CacheDb;
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

/// The main MCP server handler for the offline agent.
#[derive(Clone)]
pub struct OfflineAgentServer {
    agent: Arc<Agent>,
    cache: CacheDb,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl OfflineAgentServer {
    /// Create a new server handler around an agent and the storage it uses.
    pub fn new(agent: Arc<Agent>, cache: CacheDb) -> Self {
        Self { agent, cache, tool_router: Self::tool_router() }
    }

    #[tool(description = "Install event: pre-cache the static asset manifest. Per-asset failures are reported, not fatal.")]
    async fn agent_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.agent).await
    }

    #[tool(description = "Activate event: delete caches of other versions and start controlling pages.")]
    async fn agent_activate(&self, params: Parameters<AgentActivateParams>) -> Result<CallToolResult, McpError> {
        activate_impl(&self.agent, params.0).await
    }

    /// Route one request through the agent.
    ///
    /// The result says whether the request was passed through to the network
    /// untouched or answered by the agent (network, cache or offline page).
    #[tool(description = "Fetch event: route a request through the offline cache agent (cache-first or network-first).")]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    #[tool(description = "Message event: post a control message such as SKIP_WAITING to the agent.")]
    async fn agent_message(&self, params: Parameters<AgentMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.agent, params.0).await
    }

    #[tool(description = "List cache stores with their entry counts and the current store names.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.agent, &self.cache).await
    }

    #[tool(description = "Read the entry stored for a request URL, from one store or the current ones.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.agent, &self.cache, params.0).await
    }
}

impl ServerHandler for OfflineAgentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offline-agent".into(),
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
