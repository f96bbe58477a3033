//! Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Classification of a failed gateway exchange
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// Credentials rejected or missing
    Auth,
    /// Transport failure (DNS, connect, reset, 5xx)
    Network,
    /// The service asked us to slow down
    RateLimit,
    /// The response body could not be interpreted
    MalformedResponse,
    /// No response within the configured deadline
    Timeout,
    /// Anything else the service reported
    Other,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::MalformedResponse => "malformed_response",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// A failed gateway exchange. No turn is appended when one of these occurs.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::RateLimit, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::MalformedResponse, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Other, message)
    }
}

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Blank user input; callers treat this as a silent no-op
    #[error("Empty input")]
    EmptyInput,

    /// Model gateway failure
    #[error("Gateway {0}")]
    Gateway(#[from] GatewayError),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Too many chained tool rounds for one submission
    #[error("Round limit ({0}) reached")]
    RoundLimit(usize),

    /// The in-flight round was cancelled by the caller
    #[error("Round cancelled")]
    Cancelled,

    /// A submission arrived while a round was still in flight
    #[error("A round is already in progress")]
    Busy,

    /// The session worker has shut down
    #[error("Session worker is no longer running")]
    WorkerGone,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => matches!(
                e.kind,
                GatewayErrorKind::Network | GatewayErrorKind::RateLimit | GatewayErrorKind::Timeout
            ),
            Self::Io(_) | Self::Cancelled => true,
            _ => false,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyInput => "Please type a message first.".into(),
            Self::Gateway(e) => match e.kind {
                GatewayErrorKind::Auth => "Authentication failed. Please check your API key.".into(),
                GatewayErrorKind::RateLimit => "You've made too many requests. Please wait a moment.".into(),
                GatewayErrorKind::Timeout => "The AI service did not answer in time. Please try again.".into(),
                GatewayErrorKind::Network => "The AI service is currently unavailable. Please try again.".into(),
                _ => format!("The AI service encountered an error: {}", e.message),
            },
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::RoundLimit(n) => format!("Stopped after {n} tool rounds. Send a message to continue."),
            Self::Cancelled => "The request was cancelled.".into(),
            Self::Busy => "Still working on the previous message.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
