//! # agent-runtime
//!
//! Model gateways for the capri-agent system.
//!
//! ## Gateways
//!
//! - **Anthropic** (default): Messages API over HTTPS
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::anthropic::AnthropicGateway;
//!
//! let gateway = AnthropicGateway::from_env()?;
//! let orchestrator = Orchestrator::new(Arc::new(gateway), tools, OrchestratorConfig::from_env());
//! ```

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicGateway};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, GatewayError, ModelGateway, Orchestrator, OrchestratorConfig, Result, Session, Tool, ToolRegistry,
};
