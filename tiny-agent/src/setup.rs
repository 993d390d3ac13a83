//! Wires the Agent Loop's collaborators together from CLI flags + config
//! (spec §10.3's precedence chain: flag > env var > config file > default).

use std::path::PathBuf;
use std::sync::Arc;

use tiny_agent_confirm::{ConfirmationBroker, ConfirmationHandler};
use tiny_agent_conversation::ConversationStore;
use tiny_agent_loop::Agent;
use tiny_agent_mcp::McpManager;
use tiny_agent_memory::MemoryStore;
use tiny_agent_search::DuckDuckGoSearch;
use tiny_agent_skill::SkillRegistry;
use tiny_agent_tool::ToolRegistry;
use tiny_agent_types::McpServerConfig;

use crate::cli::Cli;
use crate::config::{self, Config};

const DEFAULT_SYSTEM_PROMPT: &str = "You are tiny-agent, a terminal coding assistant. \
Use the available tools to read, search, and edit files, and to run shell commands. \
Ask for confirmation before anything destructive; prefer the smallest change that solves the task.";

/// Everything a command handler needs: the assembled agent plus the
/// resolved model name and a handle to the MCP manager (for the `mcp`
/// subcommands).
pub struct Session {
    pub agent: Arc<Agent>,
    pub model: String,
    pub mcp: Arc<McpManager>,
    pub memories: Arc<MemoryStore>,
    pub conversation: Arc<ConversationStore>,
    pub skills: Arc<SkillRegistry>,
}

/// Builds a [`Session`] from parsed CLI flags and the loaded config file.
pub async fn build(cli: &Cli, config: &Config) -> Result<Session, String> {
    let model = config::resolve_string(
        cli.model.clone(),
        "TINY_AGENT_MODEL",
        config.default_model.clone(),
        "claude-sonnet-4-5",
    );

    let system_prompt = match (&cli.agents_md, &config.system_prompt) {
        (Some(path), _) => load_agents_md(path, &system_prompt_base(config)).await,
        (None, _) => system_prompt_base(config),
    };

    let max_context_tokens = config::resolve_usize(
        "TINY_AGENT_MAX_CONTEXT_TOKENS",
        config.max_context_tokens,
        tiny_agent_loop::DEFAULT_MAX_CONTEXT_TOKENS,
    );
    let max_memory_tokens = if cli.no_memory {
        Some(0)
    } else {
        std::env::var("TINY_AGENT_MAX_MEMORY_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(config.max_memory_tokens)
    };

    let broker = if cli.allow_all {
        let broker = ConfirmationBroker::new();
        broker.set_approve_all(true);
        broker
    } else {
        let handler: Arc<dyn ConfirmationHandler> = Arc::new(crate::confirm::TerminalConfirmationHandler);
        ConfirmationBroker::with_handler(handler)
    };

    let registry = Arc::new(ToolRegistry::with_confirmation_broker(broker));
    tiny_agent_tools::register_core_tools(&registry).map_err(|e| e.to_string())?;
    tiny_agent_tools::register_web_search(&registry, Arc::new(DuckDuckGoSearch::new()))
        .map_err(|e| e.to_string())?;

    let memory_path = resolve_memory_path(cli, config);
    let memories = Arc::new(match memory_path {
        Some(path) if !cli.no_memory => MemoryStore::at_path(path),
        _ => MemoryStore::in_memory(),
    });
    memories.init().await.map_err(|e| e.to_string())?;

    let conversation_path = resolve_conversation_path(config);
    let conversation = Arc::new(match conversation_path {
        Some(path) => ConversationStore::at_path(path),
        None => ConversationStore::in_memory(),
    });
    conversation.load_history().await;

    let mut skill_registry = SkillRegistry::new();
    for dir in config.skill_directories.iter().chain(cli.skills_dir.iter()) {
        if let Err(e) = skill_registry.scan_directory(dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to scan skill directory");
        }
    }
    let skills = Arc::new(skill_registry);
    tiny_agent_tools::register_skill_tool(&registry, Arc::clone(&skills)).map_err(|e| e.to_string())?;

    let mcp = Arc::new(McpManager::new());
    for pattern in &config.disabled_mcp_patterns {
        mcp.disable_pattern(pattern).await;
    }
    for (name, entry) in &config.mcp_servers {
        mcp.add_server(McpServerConfig {
            name: name.clone(),
            command: entry.command.clone(),
            args: entry.args.clone(),
            env: entry.env.clone(),
        })
        .await;
    }
    for (server, def) in mcp.bridgeable_tools().await {
        let name = def.name.clone();
        let tool = mcp.create_tool_from_mcp(server, def);
        if let Err(e) = registry.register(tool) {
            tracing::warn!(tool = %name, error = %e, "failed to bridge MCP tool");
        }
    }

    let provider = crate::provider::build(&model, cli.provider.as_deref(), &config.providers)?;

    let agent = Agent::new(
        provider,
        Arc::clone(&registry),
        Arc::clone(&memories),
        Arc::clone(&conversation),
        Arc::clone(&skills),
        system_prompt,
    )
    .with_max_context_tokens(max_context_tokens);
    let agent = match max_memory_tokens {
        Some(n) => agent.with_max_memory_tokens(n),
        None => agent,
    };

    Ok(Session {
        agent: Arc::new(agent),
        model,
        mcp,
        memories,
        conversation,
        skills,
    })
}

fn system_prompt_base(config: &Config) -> String {
    config
        .system_prompt
        .clone()
        .or_else(|| std::env::var("TINY_AGENT_SYSTEM_PROMPT").ok())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

async fn load_agents_md(path: &PathBuf, base: &str) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(extra) => format!("{base}\n\n{extra}"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read agents-md file");
            base.to_string()
        }
    }
}

fn resolve_memory_path(cli: &Cli, config: &Config) -> Option<PathBuf> {
    cli.memory_file
        .clone()
        .or_else(|| std::env::var("TINY_AGENT_MEMORY_FILE").ok().map(PathBuf::from))
        .or_else(|| config.memory_file.clone())
}

fn resolve_conversation_path(config: &Config) -> Option<PathBuf> {
    std::env::var("TINY_AGENT_CONVERSATION_FILE")
        .ok()
        .map(PathBuf::from)
        .or_else(|| config.conversation_file.clone())
}
