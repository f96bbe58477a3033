//! # agent-core
//!
//! Conversation-driven tool orchestration with a provider-agnostic model
//! gateway and an extensible tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Session worker                            │
//! │  ┌──────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Orchestrator │  │    Tools    │  │    ModelGateway     │  │
//! │  │  round loop  │──│   Registry  │──│     (Strategy)      │  │
//! │  └──────────────┘  └─────────────┘  └─────────────────────┘  │
//! │          │ SessionEvent                                       │
//! └──────────┼───────────────────────────────────────────────────┘
//!            ▼
//!      interactive surface
//! ```
//!
//! The `ModelGateway` trait keeps the round loop independent of which
//! service answers the model requests.

pub mod display;
pub mod error;
pub mod event;
pub mod gateway;
pub mod message;
pub mod orchestrator;
pub mod session;
pub mod tool;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use display::{DisplayText, truncate_for_display};
pub use error::{AgentError, GatewayError, GatewayErrorKind, Result};
pub use event::SessionEvent;
pub use gateway::{InferenceParams, ModelGateway};
pub use message::{ContentBlock, Conversation, Role, Turn};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RoundState, RunOutcome};
pub use session::{Session, SessionId};
pub use tool::{ParameterSchema, Tool, ToolDefinition, ToolDescriptor, ToolRegistry, ToolSchema};
pub use worker::{SessionHandle, spawn_session};
