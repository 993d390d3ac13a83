//! Ollama native `/api/chat` adapter implementing the unified [`Provider`]
//! contract (§4.4); serves as the catch-all "local" backend per the
//! provider-mapping table (§6). Grounded on
//! `neuron-provider-ollama/src/client.rs`.

mod error;
mod mapping;
mod streaming;

use futures::StreamExt;
use tiny_agent_types::error::ProviderError;
use tiny_agent_types::provider::{ChatStream, Provider};
use tiny_agent_types::types::{Capabilities, ChatOptions, ChatResponse};

use error::{map_http_status, map_reqwest_error};
use mapping::{from_api_response, to_api_request};

const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a locally-served Ollama daemon.
pub struct Ollama {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Ollama {
    /// Create a client pointed at the default local daemon.
    #[must_use]
    pub fn new() -> Self {
        Self { model: DEFAULT_MODEL.into(), base_url: DEFAULT_BASE_URL.into(), client: reqwest::Client::new() }
    }

    /// Override the default model used when a request leaves it blank.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the daemon's base URL (for remote or non-default ports).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    fn capabilities(&self, _model: &str) -> Capabilities {
        Capabilities {
            supports_tools: true,
            supports_streaming: true,
            supports_system_prompt: true,
            supports_tool_streaming: false,
            supports_thinking: false,
            context_window: None,
            max_output_tokens: None,
        }
    }

    async fn chat(&self, options: ChatOptions) -> Result<ChatResponse, ProviderError> {
        let mut body = to_api_request(&options, &self.model);
        body["stream"] = serde_json::Value::Bool(false);

        tracing::debug!(model = %body["model"], "ollama chat request");

        let response = self
            .client
            .post(self.chat_url())
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

        tracing::debug!(model = %body["model"], "ollama stream request");

        let response = self
            .client
            .post(self.chat_url())
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
