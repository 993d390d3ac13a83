//! `McpManager` — owns the lifecycle of every registered MCP server and
//! bridges their tools into a [`ToolRegistry`](tiny_agent_tool::ToolRegistry)
//! (spec §4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tiny_agent_tool::Tool;
use tiny_agent_types::{McpError, McpServer, McpServerConfig, McpToolDef, ToolResult};
use tokio::sync::RwLock;

use crate::client::McpConnection;
use crate::env::filtered_env;

/// Per-server connection state machine: `Init -> Connecting ->
/// (Connected | Failed) -> Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Registered, not yet attempted.
    Init,
    /// A connection attempt is in flight.
    Connecting,
    /// Handshake and `tools/list` succeeded.
    Connected,
    /// The most recent connection attempt failed.
    Failed,
    /// Explicitly disconnected (shutdown or `removeServer`).
    Disconnected,
}

struct ManagedServer {
    config: McpServerConfig,
    state: ServerState,
    connection: Option<McpConnection>,
    tools: Vec<McpToolDef>,
    retry_count: u32,
}

/// Owns zero or more MCP subprocess/HTTP connections.
pub struct McpManager {
    servers: RwLock<HashMap<String, ManagedServer>>,
    disabled_patterns: RwLock<Vec<Regex>>,
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl McpManager {
    /// A manager with no servers registered.
    #[must_use]
    pub fn new() -> Self {
        Self { servers: RwLock::new(HashMap::new()), disabled_patterns: RwLock::new(Vec::new()) }
    }

    /// Register `name` with a glob pattern (e.g. `mcp_fileserver_*`)
    /// hiding matching bridged tool names from the registry.
    pub async fn disable_pattern(&self, pattern: &str) {
        self.disabled_patterns.write().await.push(glob_to_regex(pattern));
    }

    /// Register a new server. Returns `false` without connecting if `name`
    /// is already registered or `command` is not resolvable on `PATH`.
    /// Tolerates a failed first connection attempt (lazy reconnect later).
    pub async fn add_server(&self, config: McpServerConfig) -> bool {
        {
            let servers = self.servers.read().await;
            if servers.contains_key(&config.name) {
                return false;
            }
        }
        if which(&config.command).is_none() {
            return false;
        }

        let name = config.name.clone();
        {
            let mut servers = self.servers.write().await;
            servers.insert(
                name.clone(),
                ManagedServer {
                    config,
                    state: ServerState::Init,
                    connection: None,
                    tools: Vec::new(),
                    retry_count: 0,
                },
            );
        }
        let _ = self.connect(&name).await;
        true
    }

    /// Spawn/attach and run the `initialize` + `tools/list` handshake.
    pub async fn connect(&self, name: &str) -> Result<(), McpError> {
        let config = {
            let mut servers = self.servers.write().await;
            let server = servers.get_mut(name).ok_or_else(|| McpError::UnknownServer(name.into()))?;
            server.state = ServerState::Connecting;
            server.config.clone()
        };

        match self.try_connect_once(&config).await {
            Ok((connection, tools)) => {
                let mut servers = self.servers.write().await;
                if let Some(server) = servers.get_mut(name) {
                    server.connection = Some(connection);
                    server.tools = tools;
                    server.state = ServerState::Connected;
                    server.retry_count = 0;
                }
                Ok(())
            }
            Err(e) => {
                let mut servers = self.servers.write().await;
                if let Some(server) = servers.get_mut(name) {
                    server.state = ServerState::Failed;
                }
                Err(e)
            }
        }
    }

    /// Reconnect with up to 3 retries, backing off 1s, 2s, 3s between
    /// attempts, before marking the server `Failed`.
    async fn connect_with_retries(&self, name: &str) -> Result<(), McpError> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
            match self.connect(name).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| McpError::Connection("exhausted retries".into())))
    }

    async fn try_connect_once(
        &self,
        config: &McpServerConfig,
    ) -> Result<(McpConnection, Vec<McpToolDef>), McpError> {
        let mut command = tokio::process::Command::new(&config.command);
        command.args(&config.args);
        command.env_clear();
        command.envs(filtered_env());
        command.envs(&config.env);

        let connection = McpConnection::connect_stdio(command)
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;
        let tools = connection.list_tools().await.map_err(|e| McpError::Initialization(e.to_string()))?;
        Ok((connection, tools))
    }

    /// `tools/call`. Reconnects with backoff (up to 3 attempts, 1s/2s/3s)
    /// if the server is not currently connected, per spec §4.6.
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        args: serde_json::Value,
    ) -> ToolResult {
        let needs_reconnect = {
            let servers = self.servers.read().await;
            match servers.get(server) {
                None => return ToolResult::err(format!("unknown MCP server: {server}")),
                Some(s) => s.state != ServerState::Connected,
            }
        };

        if needs_reconnect {
            if let Err(e) = self.connect_with_retries(server).await {
                return ToolResult::err(format!("MCP server \"{server}\" unavailable: {e}"));
            }
        }

        let servers = self.servers.read().await;
        let Some(managed) = servers.get(server) else {
            return ToolResult::err(format!("unknown MCP server: {server}"));
        };
        let Some(connection) = &managed.connection else {
            return ToolResult::err(format!("MCP server \"{server}\" not connected"));
        };

        match connection.call_tool(tool, args).await {
            Ok(Ok(text)) => ToolResult::ok(text),
            Ok(Err(text)) => ToolResult::err(text),
            Err(e) => ToolResult::err(format!("MCP call failed: {e}")),
        }
    }

    /// Disconnect, reset the retry counter, and reconnect.
    pub async fn restart_server(&self, name: &str) -> Result<(), McpError> {
        self.disconnect_one(name).await;
        {
            let mut servers = self.servers.write().await;
            if let Some(server) = servers.get_mut(name) {
                server.retry_count = 0;
                server.state = ServerState::Init;
            }
        }
        self.connect_with_retries(name).await
    }

    async fn disconnect_one(&self, name: &str) {
        let connection = {
            let mut servers = self.servers.write().await;
            servers.get_mut(name).and_then(|s| s.connection.take())
        };
        if let Some(connection) = connection {
            let closed = tokio::time::timeout(Duration::from_secs(1), connection.close()).await;
            if closed.is_err() {
                tracing::warn!(server = name, "MCP server did not shut down within grace period");
            }
        }
        let mut servers = self.servers.write().await;
        if let Some(server) = servers.get_mut(name) {
            server.state = ServerState::Disconnected;
        }
    }

    /// Shut down every connected server: `shutdown`, SIGTERM (handled by
    /// `close`'s service-level cancel), escalating to a hard kill if the
    /// 1s grace period elapses.
    pub async fn disconnect_all(&self) {
        let names: Vec<String> = self.servers.read().await.keys().cloned().collect();
        for name in names {
            self.disconnect_one(&name).await;
        }
    }

    /// Snapshot of every registered server's current state.
    pub async fn list_servers(&self) -> Vec<McpServer> {
        let servers = self.servers.read().await;
        servers
            .values()
            .map(|s| McpServer {
                config: s.config.clone(),
                connected: s.state == ServerState::Connected,
                tools: s.tools.clone(),
            })
            .collect()
    }

    /// Every `(server, tool)` pair not hidden by a `disable_pattern`
    /// glob, ready to be wrapped via [`Self::create_tool_from_mcp`].
    pub async fn bridgeable_tools(&self) -> Vec<(String, McpToolDef)> {
        let servers = self.servers.read().await;
        let patterns = self.disabled_patterns.read().await;
        let mut out = Vec::new();
        for server in servers.values() {
            if server.state != ServerState::Connected {
                continue;
            }
            for tool in &server.tools {
                let bridged_name = format!("mcp_{}_{}", server.config.name, tool.name);
                if patterns.iter().any(|re| re.is_match(&bridged_name)) {
                    continue;
                }
                out.push((server.config.name.clone(), tool.clone()));
            }
        }
        out
    }

    /// Wrap `def` (discovered on `server`) as a [`Tool`] the registry can
    /// hold directly. Always dangerous — MCP tools run arbitrary
    /// server-defined code.
    #[must_use]
    pub fn create_tool_from_mcp(self: &Arc<Self>, server: String, def: McpToolDef) -> Arc<dyn Tool> {
        let bridged_name = format!("mcp_{}_{}", server, def.name);
        let description = format!("[MCP: {}] {}", server, def.description);
        Arc::new(McpBridgedTool {
            manager: Arc::clone(self),
            server,
            tool_name: def.name,
            bridged_name,
            description,
            input_schema: def.input_schema,
        })
    }
}

struct McpBridgedTool {
    manager: Arc<McpManager>,
    server: String,
    tool_name: String,
    bridged_name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[async_trait::async_trait]
impl Tool for McpBridgedTool {
    fn name(&self) -> &str {
        &self.bridged_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.input_schema.clone()
    }

    fn dangerous(&self, _args: &serde_json::Value) -> Option<String> {
        Some(format!("Call MCP tool \"{}\" on server \"{}\"", self.tool_name, self.server))
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        self.manager.call_tool(&self.server, &self.tool_name, args).await
    }
}

/// Converts a `disabledPatterns` glob (e.g. `mcp_fileserver_*`) into a
/// regex: `*` becomes `.*`, everything else is escaped literally.
#[must_use]
pub fn glob_to_regex(pattern: &str) -> Regex {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let body = escaped.join(".*");
    Regex::new(&format!("^{body}$")).unwrap_or_else(|_| Regex::new("$^").expect("empty-match regex is valid"))
}

/// Whether `command` resolves to an executable on `PATH` (or is itself an
/// absolute/relative path that exists).
fn which(command: &str) -> Option<std::path::PathBuf> {
    let path = std::path::Path::new(command);
    if path.is_absolute() || command.contains('/') {
        return if path.is_file() { Some(path.to_path_buf()) } else { None };
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).map(|dir| dir.join(command)).find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_any_suffix() {
        let re = glob_to_regex("mcp_fileserver_*");
        assert!(re.is_match("mcp_fileserver_read"));
        assert!(!re.is_match("mcp_other_read"));
    }

    #[test]
    fn glob_without_star_is_exact() {
        let re = glob_to_regex("mcp_fileserver_read");
        assert!(re.is_match("mcp_fileserver_read"));
        assert!(!re.is_match("mcp_fileserver_read_extra"));
    }

    #[test]
    fn which_finds_path_binaries() {
        assert!(which("sh").is_some());
        assert!(which("definitely-not-a-real-binary-xyz").is_none());
    }
}
