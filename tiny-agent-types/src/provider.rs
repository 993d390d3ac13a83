//! The `Provider` trait every LLM backend implements, plus model-name
//! routing to a backend kind.

use crate::error::ProviderError;
use crate::types::{Capabilities, ChatOptions, ChatResponse, StreamChunk};
use std::pin::Pin;

/// A stream of [`StreamChunk`]s, boxed so backends can return whichever
/// concrete stream type they produce internally.
pub type ChatStream =
    Pin<Box<dyn futures::Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Unifies Anthropic, OpenAI-compatible, and Ollama wire protocols behind
/// one request/response contract. Mirrors the teacher's `Provider` trait
/// (`neuron_types::Provider`, implemented by `neuron-provider-anthropic`'s
/// `Anthropic` client) but is intentionally NOT written with RPITIT
/// (`impl Future`) syntax so it stays dyn-compatible: the Agent Loop holds
/// providers behind `Arc<dyn Provider>`, unlike the teacher's
/// `ReactOperator<P: Provider>` which stays generic over a concrete type.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier for logs and error messages (`"anthropic"`,
    /// `"openai"`, `"ollama"`).
    fn name(&self) -> &str;

    /// What this backend supports for `model`. Called once per turn by the
    /// Agent Loop to decide whether to advertise tools, request streaming,
    /// etc.
    fn capabilities(&self, model: &str) -> Capabilities;

    /// Run a non-streaming completion to exhaustion.
    async fn chat(&self, options: ChatOptions) -> Result<ChatResponse, ProviderError>;

    /// Run a streaming completion, yielding chunks as they arrive.
    async fn stream(&self, options: ChatOptions) -> Result<ChatStream, ProviderError>;
}

/// Which backend a model name routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// `claude*` models via the native Anthropic Messages API.
    Anthropic,
    /// `o1*`, `o3*`, and `gpt*` (excluding `gpt-oss*`/`gpt-v*`) models via
    /// the OpenAI Chat Completions API.
    OpenAi,
    /// `openrouter/*` or a known vendor-prefixed slug
    /// (`anthropic/`, `google/`, `meta/`, `mistralai/`, `deepseek/`),
    /// routed to OpenRouter's OpenAI-compatible endpoint.
    OpenRouter,
    /// `opencode/*` slugs, routed to the Opencode gateway.
    OpenCode,
    /// Anything else: locally served models via Ollama's
    /// OpenAI-compatible endpoint.
    Ollama,
}

impl ProviderKind {
    /// Short identifier matching [`Provider::name`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::OpenCode => "opencode",
            Self::Ollama => "ollama",
        }
    }
}

/// Vendor-prefixed slugs routed to OpenRouter alongside the explicit
/// `openrouter/` prefix.
const OPENROUTER_VENDOR_PREFIXES: &[&str] =
    &["anthropic/", "google/", "meta/", "mistralai/", "deepseek/"];

/// Routes a model identifier to the backend that should serve it, per the
/// spec's provider-mapping table:
/// `^claude` → Anthropic; `^openrouter/` or a known vendor prefix →
/// OpenRouter; `^opencode/` → Opencode; `^(o1|o3|gpt)` (excluding
/// `gpt-oss`/`gpt-v`) → OpenAI; anything else → Ollama (the local-serving
/// fallback).
#[must_use]
pub fn detect_provider(model: &str) -> ProviderKind {
    if model.starts_with("claude") {
        return ProviderKind::Anthropic;
    }
    if model.starts_with("openrouter/")
        || OPENROUTER_VENDOR_PREFIXES.iter().any(|prefix| model.starts_with(prefix))
    {
        return ProviderKind::OpenRouter;
    }
    if model.starts_with("opencode/") {
        return ProviderKind::OpenCode;
    }
    if model.starts_with("o1") || model.starts_with("o3") {
        return ProviderKind::OpenAi;
    }
    if model.starts_with("gpt") && !model.starts_with("gpt-oss") && !model.starts_with("gpt-v") {
        return ProviderKind::OpenAi;
    }
    ProviderKind::Ollama
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_claude_to_anthropic() {
        assert_eq!(detect_provider("claude-sonnet-4-5"), ProviderKind::Anthropic);
    }

    #[test]
    fn routes_gpt_and_o_series_to_openai() {
        assert_eq!(detect_provider("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("o1-preview"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("o3-mini"), ProviderKind::OpenAi);
    }

    #[test]
    fn excludes_gpt_oss_and_gpt_v_from_openai() {
        assert_ne!(detect_provider("gpt-oss-120b"), ProviderKind::OpenAi);
        assert_ne!(detect_provider("gpt-v-preview"), ProviderKind::OpenAi);
        assert_eq!(detect_provider("gpt-oss-120b"), ProviderKind::Ollama);
    }

    #[test]
    fn routes_vendor_slug_to_openrouter() {
        assert_eq!(detect_provider("meta/llama-3.1-70b"), ProviderKind::OpenRouter);
        assert_eq!(detect_provider("anthropic/claude-3-haiku"), ProviderKind::OpenRouter);
        assert_eq!(detect_provider("openrouter/anything"), ProviderKind::OpenRouter);
    }

    #[test]
    fn routes_opencode_prefix_to_opencode() {
        assert_eq!(detect_provider("opencode/some-model"), ProviderKind::OpenCode);
    }

    #[test]
    fn routes_bare_name_to_ollama() {
        assert_eq!(detect_provider("llama3.1"), ProviderKind::Ollama);
        assert_eq!(detect_provider("qwen2.5-coder"), ProviderKind::Ollama);
    }

    #[test]
    fn routes_unknown_vendor_slug_to_ollama() {
        assert_eq!(detect_provider("cohere/command-r"), ProviderKind::Ollama);
    }
}
