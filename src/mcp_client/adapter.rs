//! Remote tools exposed as local capabilities.
//!
//! Each tool a server advertises becomes one `RemoteTool` registered as
//! `mcp_<remote name>`. Calls go through the shared `McpClient`; the adapter
//! never owns the server process.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::agent_core::capability::Capability;
use crate::agent_core::types::ToolDefinition;

use super::client::McpClient;
use super::errors::McpError;
use super::types::McpToolDefinition;

/// Prefix for registered remote tool names.
pub const REMOTE_TOOL_PREFIX: &str = "mcp_";

/// A tool living in an MCP server process.
pub struct RemoteTool {
    client: Arc<McpClient>,
    remote_name: String,
    definition: ToolDefinition,
}

impl RemoteTool {
    pub fn new(client: Arc<McpClient>, tool: McpToolDefinition) -> Self {
        let definition = ToolDefinition {
            name: format!("{REMOTE_TOOL_PREFIX}{}", tool.name),
            description: tool.description,
            parameters: tool.params_schema,
        };
        Self {
            client,
            remote_name: tool.name,
            definition,
        }
    }

    /// Tool name as the server knows it.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Server this tool belongs to.
    pub fn server_name(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl Capability for RemoteTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<String> {
        tracing::debug!(
            server = %self.client.name(),
            tool = %self.remote_name,
            "calling remote tool"
        );
        let result = self
            .client
            .call_tool(&self.remote_name, args)
            .await
            .with_context(|| format!("MCP tool '{}' execution failed", self.remote_name))?;

        match result {
            serde_json::Value::String(text) => Ok(text),
            other => Ok(serde_json::to_string_pretty(&other)?),
        }
    }
}

/// List the server's tools and wrap each one.
pub async fn discover_tools(client: &Arc<McpClient>) -> Result<Vec<RemoteTool>, McpError> {
    let tools = client.list_tools().await?;
    tracing::info!(server = %client.name(), count = tools.len(), "discovered tools");
    Ok(tools
        .into_iter()
        .map(|tool| RemoteTool::new(Arc::clone(client), tool))
        .collect())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
