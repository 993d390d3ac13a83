//! The `tiny-agent` binary's library half: CLI parsing, config loading,
//! provider/tool/agent wiring, and one module per subcommand. Split from
//! `main.rs` the way `loom-cli` separates `loom_cli`'s library crate from
//! its thin `loom` binary entrypoint.

pub mod cli;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod output;
pub mod provider;
pub mod setup;

use clap::Parser;

use cli::{Cli, Command};

/// Parses arguments, loads config, wires up the agent, and dispatches to
/// the selected subcommand (`chat` when none is given, per spec §6).
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load(None).await;

    match &cli.command {
        Some(Command::Config { action }) => {
            return commands::config_cmd::run(action.clone(), &config).await;
        }
        _ => {}
    }

    let session = match setup::build(&cli, &config).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    match cli.command.clone() {
        None | Some(Command::Chat) => commands::chat::run(&session, &cli).await,
        Some(Command::Run { prompt }) => commands::run_cmd::run(&session, &cli, prompt).await,
        Some(Command::Status) => {
            commands::status_cmd::run(&session, &cli, &config).await;
            0
        }
        Some(Command::Memory { action }) => commands::memory_cmd::run(&session, action).await,
        Some(Command::Skill { action }) => commands::skill_cmd::run(&session, action).await,
        Some(Command::Mcp { action }) => commands::mcp_cmd::run(&session, action).await,
        Some(Command::Config { .. }) => unreachable!("handled above"),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
