//! OpenAI Chat Completions API adapter implementing the unified [`Provider`]
//! contract (§4.4). Grounded on `neuron-provider-openai`'s client/mapping
//! split, extended here with SSE streaming (the teacher snapshot only
//! implemented non-streaming `complete`).

mod error;
mod mapping;
mod streaming;

use futures::StreamExt;
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::provider::{ChatStream, Provider};
use tiny_agent_types::types::{Capabilities, ChatOptions, ChatResponse};

use error::{map_http_status, map_reqwest_error};
use mapping::{from_api_response, to_api_request};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI Chat Completions API. Also serves OpenAI-compatible
/// gateways (OpenRouter, Opencode) when constructed with their base URL —
/// the wire format is identical.
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    org_id: Option<String>,
    client: reqwest::Client,
}

impl OpenAi {
    /// Create a client with the given API key and sensible defaults.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            org_id: None,
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model used when a request leaves it blank.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL — used to point this adapter at
    /// OpenRouter, Opencode, or any other OpenAI-compatible gateway.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the `OpenAI-Organization` header for multi-org accounts.
    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_builder(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url).bearer_auth(&self.api_key);
        if let Some(org) = &self.org_id {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }
}

#[async_trait::async_trait]
impl Provider for OpenAi {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self, model: &str) -> Capabilities {
        Capabilities {
            supports_tools: true,
            supports_streaming: true,
            supports_system_prompt: true,
            supports_tool_streaming: true,
            supports_thinking: model.starts_with('o'),
            context_window: Some(128_000),
            max_output_tokens: Some(16_384),
        }
    }

    async fn chat(&self, options: ChatOptions) -> Result<ChatResponse, ProviderError> {
        let mut body = to_api_request(&options, &self.model);
        body["stream"] = serde_json::Value::Bool(false);

        tracing::debug!(model = %body["model"], "openai chat request");

        let response = self
            .request_builder(&self.chat_url())
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
        body["stream_options"] = serde_json::json!({"include_usage": true});

        tracing::debug!(model = %body["model"], "openai stream request");

        let response = self
            .request_builder(&self.chat_url())
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
    fn default_model_and_url() {
        let client = OpenAi::new("key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.chat_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn base_url_override_supports_gateways() {
        let client = OpenAi::new("key").base_url("https://openrouter.ai/api/v1");
        assert_eq!(client.chat_url(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn capabilities_report_tools() {
        let caps = OpenAi::new("key").capabilities("gpt-4o");
        assert!(caps.supports_tools);
        assert!(caps.supports_streaming);
    }
}
