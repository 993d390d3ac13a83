//! `status` subcommand: resolved model/provider, config path, and
//! connected MCP servers.

use crate::cli::Cli;
use crate::config::{default_config_path, Config};
use crate::setup::Session;

pub async fn run(session: &Session, cli: &Cli, config: &Config) {
    let config_path = default_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unresolved: $HOME not set)".to_string());

    if cli.json {
        let servers = session.mcp.list_servers().await;
        let body = serde_json::json!({
            "model": session.model,
            "configPath": config_path,
            "trackContextUsage": config.track_context_usage.unwrap_or(true),
            "mcpServers": servers.iter().map(|s| serde_json::json!({
                "name": s.config.name,
                "connected": s.connected,
                "tools": s.tools.len(),
            })).collect::<Vec<_>>(),
        });
        println!("{body}");
        return;
    }

    println!("model:       {}", session.model);
    println!("config:      {config_path}");
    println!("skills:      {}", session.skills.list().len());
    let servers = session.mcp.list_servers().await;
    if servers.is_empty() {
        println!("mcp servers: (none configured)");
    } else {
        println!("mcp servers:");
        for server in servers {
            println!(
                "  {} — {} ({} tools)",
                server.config.name,
                if server.connected { "connected" } else { "disconnected" },
                server.tools.len()
            );
        }
    }
}
