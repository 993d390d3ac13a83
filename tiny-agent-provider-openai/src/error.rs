//! HTTP/transport error mapping, per spec §4.4's error-mapping table.

use tiny_agent_types::error::ProviderError;

pub fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(std::time::Duration::from_secs(0))
    } else if err.is_connect() {
        ProviderError::Network(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

pub fn map_http_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimited { retry_after: None },
        s if s >= 400 && s < 500 => {
            if body.to_lowercase().contains("prompt too long")
                || body.to_lowercase().contains("context length")
                || body.to_lowercase().contains("maximum context length")
            {
                ProviderError::ContextLength(body.to_string())
            } else {
                ProviderError::InvalidRequest(body.to_string())
            }
        }
        s if s >= 500 => ProviderError::Unavailable(body.to_string()),
        s => ProviderError::Other { status: s, body: body.to_string() },
    }
}
