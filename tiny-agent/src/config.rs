//! The config file's data shape (spec §6, §10.3).
//!
//! Content/UX for the loader is out of scope (§1) — this is deliberately a
//! thin, field-by-field-defaulted `serde` struct, the way `brain::BrainConfig`
//! is a plain struct fed by a small loader in the teacher. Precedence is
//! CLI flag > environment variable > config file > built-in default; each
//! resolver function in this module implements exactly that chain for one
//! setting.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tiny_agent_types::ConfigError;

/// One configured MCP server, as written in `mcpServers` in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Per-provider overrides (API key, base URL) keyed by provider name
/// (`anthropic`, `openai`, `openrouter`, `opencode`, `ollama`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverride {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Per-tool overrides, currently just an execution timeout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOverride {
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingSetting {
    pub budget_tokens: u32,
}

/// `~/.tiny-agent/config.yaml`'s top-level shape. Every field is optional
/// so a partial or missing file never fails to load (§7: `ConfigError` is
/// always locally recovered).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_model: Option<String>,
    pub system_prompt: Option<String>,
    pub conversation_file: Option<PathBuf>,
    pub memory_file: Option<PathBuf>,
    pub max_context_tokens: Option<usize>,
    pub max_memory_tokens: Option<usize>,
    pub track_context_usage: Option<bool>,
    pub thinking: Option<ThinkingSetting>,
    pub providers: HashMap<String, ProviderOverride>,
    pub tools: HashMap<String, ToolOverride>,
    pub mcp_servers: HashMap<String, McpServerEntry>,
    pub disabled_mcp_patterns: Vec<String>,
    pub skill_directories: Vec<PathBuf>,
}

/// Resolves `~/.tiny-agent/config.yaml`'s path from `HOME` (spec §6 lists
/// `HOME` among consumed environment variables; no XDG resolution crate is
/// needed since the path isn't XDG-derived).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".tiny-agent").join("config.yaml"))
}

/// Loads the config file, if present. A missing file yields
/// [`Config::default`]; a malformed one logs a warning and also yields the
/// default, per §7's "ConfigError always locally recovered" rule.
pub async fn load(path: Option<&PathBuf>) -> Config {
    let path = match path {
        Some(p) => p.clone(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Config::default(),
        },
    };

    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => match parse(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed config file, using defaults");
                Config::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file, using defaults");
            Config::default()
        }
    }
}

fn parse(contents: &str) -> Result<Config, ConfigError> {
    serde_yaml::from_str(contents).map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// CLI flag > environment variable > config file > built-in default, for a
/// `String`-valued setting.
#[must_use]
pub fn resolve_string(
    flag: Option<String>,
    env_var: &str,
    from_config: Option<String>,
    default: &str,
) -> String {
    flag.or_else(|| std::env::var(env_var).ok())
        .or(from_config)
        .unwrap_or_else(|| default.to_string())
}

/// Same precedence chain for an optional `usize` setting parsed from an
/// environment variable.
#[must_use]
pub fn resolve_usize(
    env_var: &str,
    from_config: Option<usize>,
    default: usize,
) -> usize {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .or(from_config)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: Config = serde_yaml::from_str("defaultModel: claude-sonnet-4-5\n").unwrap();
        assert_eq!(config.default_model.as_deref(), Some("claude-sonnet-4-5"));
        assert!(config.providers.is_empty());
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.default_model, None);
        assert_eq!(config.max_context_tokens, None);
    }

    #[test]
    fn resolve_string_prefers_flag_over_env_over_config() {
        std::env::remove_var("TINY_AGENT_TEST_STRING");
        assert_eq!(
            resolve_string(Some("flag".into()), "TINY_AGENT_TEST_STRING", Some("config".into()), "default"),
            "flag"
        );
        assert_eq!(
            resolve_string(None, "TINY_AGENT_TEST_STRING", Some("config".into()), "default"),
            "config"
        );
        assert_eq!(resolve_string(None, "TINY_AGENT_TEST_STRING", None, "default"), "default");
    }
}
