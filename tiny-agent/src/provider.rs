//! Builds the `Arc<dyn Provider>` the Agent Loop runs against, per the
//! spec's provider-mapping table (§6) and the three concrete adapters
//! (`tiny-agent-provider-{anthropic,openai,ollama}`).
//!
//! OpenRouter and Opencode have no adapter of their own: both are
//! OpenAI-compatible gateways, so [`ProviderKind::OpenRouter`] and
//! [`ProviderKind::OpenCode`] are served by constructing [`OpenAi`] with a
//! different base URL, exactly as `OpenAi`'s own doc comment describes.

use std::sync::Arc;

use tiny_agent_provider_anthropic::Anthropic;
use tiny_agent_provider_ollama::Ollama;
use tiny_agent_provider_openai::OpenAi;
use tiny_agent_types::{detect_provider, Provider, ProviderKind};

use crate::config::ProviderOverride;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENCODE_BASE_URL: &str = "https://opencode.ai/zen/v1";

/// Maps a [`ProviderKind`] to the environment variable holding its API key.
#[must_use]
pub fn api_key_env_var(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        ProviderKind::OpenCode => "OPENCODE_API_KEY",
        ProviderKind::Ollama => "",
    }
}

/// Picks the backend for `model`, honoring an explicit `--provider`
/// override, and constructs it from the matching config-file override (if
/// any) plus its API-key environment variable.
pub fn build(
    model: &str,
    provider_override: Option<&str>,
    overrides: &std::collections::HashMap<String, ProviderOverride>,
) -> Result<Arc<dyn Provider>, String> {
    let kind = match provider_override {
        Some(name) => parse_kind(name).ok_or_else(|| format!("unknown provider: {name}"))?,
        None => detect_provider(model),
    };

    let over = overrides.get(kind.as_str()).cloned().unwrap_or_default();

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Anthropic => {
            let api_key = resolve_api_key(&over, kind)?;
            let mut client = Anthropic::new(api_key).model(model);
            if let Some(url) = over.base_url {
                client = client.base_url(url);
            }
            Arc::new(client)
        }
        ProviderKind::OpenAi => {
            let api_key = resolve_api_key(&over, kind)?;
            let mut client = OpenAi::new(api_key).model(model);
            if let Some(url) = over.base_url {
                client = client.base_url(url);
            }
            Arc::new(client)
        }
        ProviderKind::OpenRouter => {
            let api_key = resolve_api_key(&over, kind)?;
            let client = OpenAi::new(api_key)
                .model(model)
                .base_url(over.base_url.unwrap_or_else(|| OPENROUTER_BASE_URL.to_string()));
            Arc::new(client)
        }
        ProviderKind::OpenCode => {
            let api_key = resolve_api_key(&over, kind)?;
            let client = OpenAi::new(api_key)
                .model(model)
                .base_url(over.base_url.unwrap_or_else(|| OPENCODE_BASE_URL.to_string()));
            Arc::new(client)
        }
        ProviderKind::Ollama => {
            let mut client = Ollama::new().model(model);
            if let Some(url) = over.base_url {
                client = client.base_url(url);
            }
            Arc::new(client)
        }
    };

    Ok(provider)
}

fn resolve_api_key(over: &ProviderOverride, kind: ProviderKind) -> Result<String, String> {
    over.api_key
        .clone()
        .or_else(|| std::env::var(api_key_env_var(kind)).ok())
        .ok_or_else(|| format!("missing API key for provider {} ({})", kind.as_str(), api_key_env_var(kind)))
}

fn parse_kind(name: &str) -> Option<ProviderKind> {
    match name {
        "anthropic" => Some(ProviderKind::Anthropic),
        "openai" => Some(ProviderKind::OpenAi),
        "openrouter" => Some(ProviderKind::OpenRouter),
        "opencode" => Some(ProviderKind::OpenCode),
        "ollama" => Some(ProviderKind::Ollama),
        _ => None,
    }
}
