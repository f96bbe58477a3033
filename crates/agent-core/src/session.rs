//! Session Management
//!
//! A session owns one conversation and the orchestrator state for it. It is
//! held by exactly one worker at a time and lives only as long as the
//! process does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Conversation, Turn};
use crate::orchestrator::RoundState;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single conversation with its orchestration state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    conversation: Conversation,

    state: RoundState,

    /// Gateway calls made over the session's lifetime
    pub gateway_calls: usize,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            conversation: Conversation::new(),
            state: RoundState::AwaitingInput,
            gateway_calls: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with specific ID
    pub fn with_id(id: SessionId) -> Self {
        let mut session = Self::new();
        session.id = id;
        session
    }

    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub const fn state(&self) -> RoundState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RoundState) {
        self.state = state;
        self.touch();
    }

    pub(crate) fn append(&mut self, turn: Turn) {
        self.conversation.push(turn);
        self.touch();
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new();
        assert_eq!(session.state(), RoundState::AwaitingInput);
        assert!(session.conversation().is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_append_touches_session() {
        let mut session = Session::with_id(SessionId::from_string("fixed"));
        session.append(Turn::user_text("list files in docs"));
        assert_eq!(session.id.as_str(), "fixed");
        assert_eq!(session.conversation().len(), 1);
        assert!(session.updated_at >= session.created_at);
    }
}
