//! Lifecycle manager for MCP (Model Context Protocol) subprocess/HTTP tool
//! servers, exposing their tools as ordinary [`tiny_agent_tool::Tool`]
//! instances (spec §4.6). Grounded on `neuron-mcp`'s client/bridge split.

mod client;
mod env;
mod error;
mod manager;

pub use env::{filtered_env, is_allowed};
pub use manager::{glob_to_regex, McpManager, ServerState};
