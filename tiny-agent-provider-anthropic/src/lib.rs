//! Anthropic Messages API adapter implementing the unified [`Provider`]
//! contract (§4.4). Grounded on `neuron-provider-anthropic`'s
//! client/mapping/streaming split, rewritten against the new
//! `Message`/`ChatOptions`/`StreamChunk` data model.

mod error;
mod mapping;
mod streaming;

use futures::StreamExt;
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::provider::{ChatStream, Provider};
use tiny_agent_types::types::{Capabilities, ChatOptions, ChatResponse};

use error::{map_http_status, map_reqwest_error};
use mapping::{from_api_response, to_api_request};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct Anthropic {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Anthropic {
    /// Create a client with the given API key and sensible defaults.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model used when a request leaves it blank.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (for proxies or testing).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait::async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self, model: &str) -> Capabilities {
        Capabilities {
            supports_tools: true,
            supports_streaming: true,
            supports_system_prompt: true,
            supports_tool_streaming: true,
            supports_thinking: model.contains("opus") || model.contains("sonnet"),
            context_window: Some(200_000),
            max_output_tokens: Some(if model.contains("opus") { 32_000 } else { 64_000 }),
        }
    }

    async fn chat(&self, options: ChatOptions) -> Result<ChatResponse, ProviderError> {
        let mut body = to_api_request(&options, &self.model);
        body["stream"] = serde_json::Value::Bool(false);

        tracing::debug!(model = %body["model"], "anthropic chat request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid JSON response: {e}")))?;
        from_api_response(&json)
    }

    async fn stream(&self, options: ChatOptions) -> Result<ChatStream, ProviderError> {
        let mut body = to_api_request(&options, &self.model);
        body["stream"] = serde_json::Value::Bool(true);

        tracing::debug!(model = %body["model"], "anthropic stream request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.map_err(map_reqwest_error)?;
            return Err(map_http_status(status, &text));
        }

        Ok(Box::pin(streaming::stream_completion(response).boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_and_base_url() {
        let client = Anthropic::new("sk-ant-test");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_overrides() {
        let client = Anthropic::new("k").model("claude-opus-4-5").base_url("http://x");
        assert_eq!(client.model, "claude-opus-4-5");
        assert_eq!(client.messages_url(), "http://x/v1/messages");
    }

    #[test]
    fn capabilities_report_tools_and_streaming() {
        let client = Anthropic::new("k");
        let caps = client.capabilities("claude-sonnet-4-5");
        assert!(caps.supports_tools);
        assert!(caps.supports_streaming);
        assert!(caps.supports_thinking);
    }
}
