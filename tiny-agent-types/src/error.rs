//! Error taxonomy shared by every tiny-agent crate.
//!
//! One `thiserror` enum per failure domain, matching the error-kind table in
//! the specification: `ConfigError`, `ProviderUnavailable`, `ContextLength`,
//! `RateLimited`, `ToolNotFound`, `ToolExecutionError`, `McpUnavailable`,
//! `ConfirmationDeclined`, `Cancelled`, `PathSecurityViolation`.

use std::time::Duration;

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(String),
    /// Rate limited by the provider (HTTP 429).
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay, if the provider sent one.
        retry_after: Option<Duration>,
    },
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Provider service is temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// Authentication/authorization failure (missing or invalid API key).
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The prompt exceeds the model's context window.
    #[error("context length exceeded: {0}")]
    ContextLength(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Requested model does not exist.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// Error during streaming.
    #[error("stream error: {0}")]
    StreamError(String),
    /// Any other provider error, tagged with the raw HTTP status and body.
    #[error("provider error ({status}): {body}")]
    Other {
        /// HTTP status code, or 0 for non-HTTP transports.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },
}

impl ProviderError {
    /// Whether the Agent Loop should retry the request (with backoff) rather
    /// than surfacing the error immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

/// Errors from tool operations (Tool Registry and built-in tools).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The model called a tool name not present in the registry.
    #[error("Tool \"{0}\" not found")]
    NotFound(String),
    /// Input failed JSON-schema validation against the tool's declared parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The tool's own execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// The user declined the confirmation prompt for a dangerous call.
    #[error("User declined confirmation")]
    ConfirmationDeclined,
    /// Execution was cancelled via the turn's cancellation token.
    #[error("cancelled")]
    Cancelled,
    /// The resolved path falls under a protected or sensitive location.
    #[error("sensitive path: {0}")]
    PathSecurityViolation(String),
    /// Tool execution exceeded its configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// `register` was called with a name already present in the registry.
    #[error("tool \"{0}\" is already registered")]
    AlreadyRegistered(String),
}

/// Errors from context management operations (Context Composer).
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Failed to assemble a bounded-token message list.
    #[error("composition failed: {0}")]
    CompositionFailed(String),
}

/// Errors from the Memory Store.
#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    /// I/O error reading or writing the memory file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The memory file failed to parse; treated as empty by the caller, but
    /// surfaced here so callers may log it.
    #[error("malformed memory file: {0}")]
    Malformed(String),
    /// Referenced a memory id that does not exist.
    #[error("memory not found: {0}")]
    NotFound(String),
}

/// Errors from the MCP Manager.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Failed to spawn or connect to the MCP subprocess.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The MCP `initialize` handshake failed.
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// A `tools/call` request failed.
    #[error("tool call failed: {0}")]
    ToolCall(String),
    /// Transport-level error (stdio pipe closed, HTTP error, etc.).
    #[error("transport error: {0}")]
    Transport(String),
    /// The named server is not registered.
    #[error("unknown server: {0}")]
    UnknownServer(String),
    /// A server with this name is already registered.
    #[error("duplicate server: {0}")]
    DuplicateServer(String),
}

/// Errors from the Skill Registry.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// I/O error reading a skill file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Frontmatter failed to parse as YAML.
    #[error("invalid frontmatter: {0}")]
    InvalidFrontmatter(String),
    /// Frontmatter is missing a required field (`name` or `description`).
    #[error("missing required field: {0}")]
    MissingField(String),
    /// `name` does not match `^[a-z0-9]+(-[a-z0-9]+)*$`.
    #[error("invalid skill name: {0}")]
    InvalidName(String),
    /// No skill registered under this name.
    #[error("skill not found: {0}")]
    NotFound(String),
}

/// Errors from the Conversation Store.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// I/O error reading or writing the conversation file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the Confirmation Broker.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    /// No handler has been installed to answer confirmation requests.
    #[error("no confirmation handler installed")]
    NoHandler,
}

/// Errors from the Search Provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Network-level error reaching the search backend.
    #[error("network error: {0}")]
    Network(String),
    /// The backend returned a response we could not parse.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from loading and validating the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML failed to parse; recovered locally by falling back to defaults.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors from the Agent Loop — aggregates every collaborator's error type.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Tool execution failed.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
    /// Context management failed.
    #[error("context error: {0}")]
    Context(#[from] ContextError),
    /// Memory Store failed.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryStoreError),
    /// The loop exceeded the configured iteration cap.
    #[error("max iterations reached ({0})")]
    MaxIterations(usize),
    /// A usage limit (token budget, request count, tool-call count) was exceeded.
    #[error("usage limit exceeded: {0}")]
    UsageLimitExceeded(String),
    /// The turn was cancelled via its cancellation token.
    #[error("cancelled")]
    Cancelled,
}
