use thiserror::Error;

/// Top-level error type for the Confab relay.
#[derive(Debug, Error)]
pub enum ConfabError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("LLM provider error ({provider}): {message}")]
    Llm { provider: String, message: String },

    #[error("{service} request failed ({status}): {message}")]
    Transport {
        service: String,
        status: u16,
        message: String,
    },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("an exchange is already in flight for this session")]
    SessionBusy,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConfabError {
    /// Whether the error came from the caller's arguments rather than the environment.
    pub fn is_tool_logic(&self) -> bool {
        matches!(
            self,
            ConfabError::InvalidArguments { .. }
                | ConfabError::UnsupportedOperator(_)
                | ConfabError::DivisionByZero
                | ConfabError::Overflow(_)
        )
    }
}
