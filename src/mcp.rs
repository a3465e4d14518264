//! MCP JSON-RPC protocol bridge.
//!
//! Exposes the [`ToolRegistry`] as MCP tools over the Streamable HTTP
//! transport mounted at `/mcp`. Tool calls go through the same
//! [`ToolRegistry::dispatch`] as `POST /tools/{name}`, so unknown tools and
//! bad arguments come back as `isError` results rather than protocol errors.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::config::Config;
use crate::snapshot::KnowledgeHandle;
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};

/// Cloned into every MCP session; all sessions read the same snapshot handle.
#[derive(Clone)]
pub struct McpBridge {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    handle: Arc<KnowledgeHandle>,
}

impl McpBridge {
    pub fn new(config: Arc<Config>, tools: Arc<ToolRegistry>, handle: Arc<KnowledgeHandle>) -> Self {
        Self {
            config,
            tools,
            handle,
        }
    }

    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> =
            match tool.parameters_schema() {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Dispatch against the current snapshot.
    pub fn call(&self, name: &str, params: serde_json::Value) -> ToolOutput {
        let Some(engine) = self.handle.engine() else {
            return ToolOutput::error("knowledge base not loaded");
        };
        let ctx = ToolContext {
            engine: &engine,
            limits: &self.config.query,
        };
        self.tools.dispatch(name, params, &ctx)
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "texkb".to_string(),
                title: Some("LaTeX knowledge base".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Knowledge extracted from LaTeX package manuals. Use get_latex_chart_example \
                 for runnable chart code, search_latex_knowledge for free-text lookup, \
                 get_command_spec for command and environment syntax, and get_human_feedback \
                 for warnings and notes."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let output = self.call(&request.name, params);
        let content: Vec<Content> = output
            .content
            .into_iter()
            .map(|block| Content::text(block.text))
            .collect();
        if output.is_error {
            Ok(CallToolResult::error(content))
        } else {
            Ok(CallToolResult::success(content))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn unloaded_snapshot_is_an_error_result() {
        let bridge = McpBridge::new(
            Arc::new(Config::for_root("/tmp")),
            Arc::new(ToolRegistry::with_builtins()),
            Arc::new(KnowledgeHandle::empty()),
        );
        let out = bridge.call("get_human_feedback", serde_json::json!({}));
        assert!(out.is_error);
        assert_eq!(out.joined_text(), "knowledge base not loaded");
    }

    #[test]
    fn descriptors_carry_input_schema() {
        let registry = ToolRegistry::with_builtins();
        let tool = McpBridge::to_mcp_tool(registry.find("get_command_spec").unwrap());
        assert_eq!(tool.name, "get_command_spec");
        assert_eq!(tool.input_schema["required"][0], "command_name");
    }
}
