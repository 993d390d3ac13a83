//! Thin wrapper over `rmcp`'s client service: spawn/connect, discover
//! tools, call a tool, and shut down. Grounded on
//! `neuron-mcp/src/client.rs`'s `McpClient`.

use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, CallToolResult, Content, RawContent};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use tiny_agent_types::McpToolDef;

use crate::error::ConnectError;

/// A live connection to one MCP server.
pub struct McpConnection {
    service: RunningService<RoleClient, ()>,
}

impl McpConnection {
    /// Spawn `command` as a child process and complete the MCP
    /// `initialize` handshake over stdio.
    pub async fn connect_stdio(command: tokio::process::Command) -> Result<Self, ConnectError> {
        let transport =
            TokioChildProcess::new(command).map_err(|e| ConnectError(e.to_string()))?;
        let service = ().serve(transport).await.map_err(|e| ConnectError(e.to_string()))?;
        Ok(Self { service })
    }

    /// Connect via streamable HTTP rather than spawning a subprocess.
    pub async fn connect_http(url: &str) -> Result<Self, ConnectError> {
        let transport = StreamableHttpClientTransport::from_uri(url);
        let service = ().serve(transport).await.map_err(|e| ConnectError(e.to_string()))?;
        Ok(Self { service })
    }

    /// `tools/list`, mapped into the spec's [`McpToolDef`] shape.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, ConnectError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| ConnectError(e.to_string()))?;
        Ok(tools
            .into_iter()
            .map(|t| McpToolDef {
                name: t.name.to_string(),
                description: t.description.as_deref().unwrap_or("").to_string(),
                input_schema: serde_json::to_value(&*t.input_schema)
                    .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
            })
            .collect())
    }

    /// `tools/call`. MCP content blocks of type `text` are concatenated
    /// into a single string; `isError: true` maps to `Err`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<Result<String, String>, ConnectError> {
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };
        let result: CallToolResult = self
            .service
            .peer()
            .call_tool(params)
            .await
            .map_err(|e| ConnectError(e.to_string()))?;

        let text = extract_text(&result.content);
        if result.is_error == Some(true) {
            Ok(Err(text))
        } else if let Some(structured) = result.structured_content {
            Ok(Ok(structured.to_string()))
        } else {
            Ok(Ok(text))
        }
    }

    /// Graceful `shutdown` request; the transport terminates the child
    /// process once the service is cancelled.
    pub async fn close(self) -> Result<(), ConnectError> {
        self.service.cancel().await.map_err(|e| ConnectError(e.to_string()))?;
        Ok(())
    }
}

fn extract_text(content: &[Content]) -> String {
    content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
