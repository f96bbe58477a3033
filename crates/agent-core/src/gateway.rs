//! Model Gateway
//!
//! Abstraction over one remote inference request/response exchange. The
//! orchestrator works exclusively through this trait, so the HTTP client in
//! `agent-runtime` and scripted test gateways are interchangeable.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::gateway::{InferenceParams, ModelGateway};
//!
//! let blocks = gateway.infer(conversation.turns(), &registry.descriptors(), &params).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::message::{ContentBlock, Turn};
use crate::tool::ToolDescriptor;

/// Per-request model parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Model identifier (e.g., "claude-3-5-haiku-20241022")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System prompt, sent separately from the turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

const fn default_max_tokens() -> u32 {
    1024
}

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            max_tokens: default_max_tokens(),
            system: None,
        }
    }
}

/// Strategy trait for inference backends
///
/// One call is one request: no streaming, no retry. Deadlines are enforced
/// by the caller.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Send the conversation and tool descriptors, get the assistant's blocks
    async fn infer(
        &self,
        conversation: &[Turn],
        tools: &[ToolDescriptor],
        params: &InferenceParams,
    ) -> Result<Vec<ContentBlock>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_params_defaults() {
        let params = InferenceParams::default();
        assert_eq!(params.max_tokens, 1024);
        assert_eq!(params.model, DEFAULT_MODEL);
        assert!(params.system.is_none());
    }

    #[test]
    fn test_system_omitted_when_absent() {
        let value = serde_json::to_value(InferenceParams::default()).unwrap();
        assert!(value.get("system").is_none());
    }
}
