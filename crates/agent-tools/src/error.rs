//! Error Types for Workspace Tools

use thiserror::Error;

use agent_core::AgentError;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Path leaves the workspace: {0}")]
    OutsideWorkspace(String),

    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("{program} error: {stderr}")]
    ProcessFailed { program: &'static str, stderr: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub fn not_found(what: &'static str, path: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }
}

/// Tool failures reach the model as plain text
impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        Self::ToolExecution(err.to_string())
    }
}
