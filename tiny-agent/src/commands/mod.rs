//! One module per CLI subcommand, mirroring `loom-cli`'s
//! one-file-per-command layout (`tool_cmd.rs`, `serve.rs`, `repl.rs`).

pub mod chat;
pub mod config_cmd;
pub mod mcp_cmd;
pub mod memory_cmd;
pub mod run_cmd;
pub mod skill_cmd;
pub mod status_cmd;
