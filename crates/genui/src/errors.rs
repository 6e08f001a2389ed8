use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a tool call can produce. All of these are reported back to the model
/// as the tool's result rather than failing the request.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    /// The in-band shape a failed tool call takes inside the conversation.
    pub fn to_tool_result(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Errors raised while replaying tool results into a conversation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversationError {
    #[error("No tool invocation with id {0}")]
    UnknownToolCall(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
