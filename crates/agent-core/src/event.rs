//! Session Events
//!
//! One-way notifications from the session worker to whoever drives the
//! interactive surface.

use serde::{Deserialize, Serialize};

use crate::orchestrator::RoundState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The orchestrator moved to a new state
    StateChanged { state: RoundState },

    /// A text block from the assistant
    AssistantText { text: String },

    /// A registered tool is about to run
    ToolStarted {
        id: String,
        name: String,
        input_summary: String,
    },

    /// A tool use was answered. `summary` is the display copy of the result.
    ToolFinished {
        id: String,
        name: String,
        summary: String,
        is_error: bool,
        truncated: bool,
    },

    /// The submission finished with a final answer
    Done,

    /// The submission stopped; the conversation is safe to retry
    Failed { message: String, retryable: bool },
}

impl SessionEvent {
    /// Whether this event ends the current submission
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}
