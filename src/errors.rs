use thiserror::Error;

/// Failures raised by a tool while servicing a marker. These never abort a
/// turn; the processor renders them inline.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool name '{0}', it must match [a-zA-Z0-9_-]+")]
    InvalidName(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("no assistant message to update")]
    NoAssistantMessage,

    #[error("a turn is already in flight")]
    TurnInFlight,
}
