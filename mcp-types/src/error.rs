use thiserror::Error;

/// Error kinds shared across the client, process engine, and registries.
///
/// In-band tool-call failures never surface through this type; they become
/// `CallToolResult { is_error: true, .. }` instead.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("config error: {0}")]
    Config(String),

    #[error("load error: {0}")]
    Load(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("state error: {0}")]
    State(String),

    #[error("capability error: {0}")]
    Capability(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bind error: {0}")]
    Bind(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;
