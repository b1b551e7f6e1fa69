use crate::types::ToolSetId;

/// Core error type for the toolbridge system.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("toolset not found: {0}")]
    ToolsetNotFound(ToolSetId),

    /// The upstream session was closed underneath us. The only failure kind
    /// that session acquisition retries.
    #[error("session closed: {0}")]
    SessionClosed(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream reported a failure for an operation it accepted.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("invalid input schema for tool '{tool}': {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this failure means the upstream session resource was closed.
    #[must_use]
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed(_))
    }
}
