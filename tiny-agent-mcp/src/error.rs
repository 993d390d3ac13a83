//! Internal connection error, mapped into [`tiny_agent_types::McpError`]
//! at the manager boundary.

#[derive(Debug, Clone)]
pub struct ConnectError(pub String);

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConnectError {}
