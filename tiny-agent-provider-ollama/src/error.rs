//! HTTP/transport error mapping for the Ollama adapter.

use tiny_agent_types::error::ProviderError;

pub fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(std::time::Duration::from_secs(0))
    } else if err.is_connect() {
        ProviderError::Unavailable(format!("cannot reach ollama daemon: {err}"))
    } else {
        ProviderError::Network(err.to_string())
    }
}

pub fn map_http_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        404 => ProviderError::ModelNotFound(body.to_string()),
        s if s >= 400 && s < 500 => ProviderError::InvalidRequest(body.to_string()),
        s if s >= 500 => ProviderError::Unavailable(body.to_string()),
        s => ProviderError::Other { status: s, body: body.to_string() },
    }
}
