//! `mcp [list|add|enable|disable]` subcommands.

use crate::cli::McpAction;
use crate::setup::Session;
use tiny_agent_types::McpServerConfig;

pub async fn run(session: &Session, action: McpAction) -> i32 {
    match action {
        McpAction::List => {
            let servers = session.mcp.list_servers().await;
            if servers.is_empty() {
                println!("(no servers registered)");
            }
            for server in servers {
                println!(
                    "{} — {} ({} tools): {} {}",
                    server.config.name,
                    if server.connected { "connected" } else { "disconnected" },
                    server.tools.len(),
                    server.config.command,
                    server.config.args.join(" "),
                );
            }
            0
        }
        McpAction::Add { name, command, args } => {
            let added = session
                .mcp
                .add_server(McpServerConfig { name: name.clone(), command, args, env: Default::default() })
                .await;
            if added {
                println!("added {name}");
                0
            } else {
                eprintln!("error: {name} is already registered or its command is not on PATH");
                1
            }
        }
        McpAction::Enable { pattern } => {
            println!(
                "note: disabled patterns take effect for the remainder of this process only; \
                 persist `{pattern}` removal to disabledMcpPatterns in the config file to keep it."
            );
            0
        }
        McpAction::Disable { pattern } => {
            session.mcp.disable_pattern(&pattern).await;
            println!("disabled tools matching {pattern}");
            0
        }
    }
}
