//! `clap`-derived command line surface (spec §6).
//!
//! Grounded on `loom-cli`'s per-subcommand-module layout: each arm of
//! [`Command`] is handled by its own module under [`crate::commands`]
//! rather than one large `match`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "tiny-agent", version, about = "A small terminal coding agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Model identifier; routed to a provider via the spec's mapping table.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Force a specific provider instead of inferring it from `--model`.
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Enable debug logging (equivalent to `RUST_LOG=debug`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Persist the conversation to disk after the run.
    #[arg(long, global = true)]
    pub save: bool,

    /// Disable the memory tool and long-term memory retrieval for this run.
    #[arg(long, global = true)]
    pub no_memory: bool,

    /// Don't compute or print context-window usage.
    #[arg(long, global = true)]
    pub no_track_context: bool,

    /// Suppress the iteration/status line.
    #[arg(long, global = true)]
    pub no_status: bool,

    /// Disable ANSI colors in output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit one JSON object per line instead of rendered text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Approve every dangerous tool call without prompting.
    #[arg(short = 'y', long = "allow-all", global = true)]
    pub allow_all: bool,

    /// Extra project instructions file, folded into the system prompt.
    #[arg(long, global = true)]
    pub agents_md: Option<PathBuf>,

    /// Additional skill directory to scan (repeatable).
    #[arg(long = "skills-dir", global = true)]
    pub skills_dir: Vec<PathBuf>,

    /// Override the conversation-file path for this run.
    #[arg(long, global = true)]
    pub memory_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Interactive chat loop (the default when no subcommand is given).
    Chat,
    /// Run a single prompt and exit; reads stdin if `prompt` is omitted and
    /// stdin is piped.
    Run {
        /// The prompt text. Omit to read from stdin.
        prompt: Option<String>,
    },
    /// Print or open the config file.
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Print resolved model/provider/config-path/connected-MCP-server status.
    Status,
    /// Inspect or mutate the long-term memory store.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Inspect or scaffold skills.
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },
    /// Manage MCP server registrations.
    Mcp {
        #[command(subcommand)]
        action: McpAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Open the config file in `$VISUAL`/`$EDITOR`.
    Open,
}

#[derive(Debug, Clone, Subcommand)]
pub enum MemoryAction {
    /// List every stored memory.
    List,
    /// Add a new memory (category defaults to `user`).
    Add {
        content: String,
        #[arg(long, default_value = "user")]
        category: String,
    },
    /// Delete every stored memory.
    Clear,
    /// Print record count and estimated token usage.
    Stats,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SkillAction {
    /// List every discovered and builtin skill.
    List,
    /// Print one skill's rendered body.
    Show { name: String },
    /// Scaffold a new `SKILL.md` under a skill directory.
    Init { name: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum McpAction {
    /// List every registered server and its connection state.
    List,
    /// Register and connect a new server.
    Add {
        name: String,
        command: String,
        args: Vec<String>,
    },
    /// Clear a previously disabled-tool glob pattern (accept the server's
    /// tools again).
    Enable { pattern: String },
    /// Hide tools matching a glob pattern (e.g. `fileserver_*`).
    Disable { pattern: String },
}
