//! Anthropic Model Gateway
//!
//! Implementation of `ModelGateway` over the Anthropic Messages API.

use std::time::Duration;

use agent_core::{
    error::{AgentError, GatewayError, Result},
    gateway::{InferenceParams, ModelGateway},
    message::{ContentBlock, Turn},
    tool::ToolDescriptor,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Anthropic gateway configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`
    pub api_key: String,

    /// Service root; requests go to `{base_url}/v1/messages`
    pub base_url: String,

    /// Value of the `anthropic-version` header
    pub api_version: String,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".into(),
            api_version: "2023-06-01".into(),
            connect_timeout_secs: 10,
        }
    }
}

impl AnthropicConfig {
    /// Read `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL` and `ANTHROPIC_VERSION`.
    /// Only the key is mandatory.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("ANTHROPIC_API_KEY is not set".into()))?;
        let defaults = Self::default();

        Ok(Self {
            api_key,
            base_url: std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
            api_version: std::env::var("ANTHROPIC_VERSION").unwrap_or(defaults.api_version),
            ..defaults
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Request body for `POST /v1/messages`
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDescriptor],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn no_tools(tools: &&[ToolDescriptor]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<serde_json::Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Anthropic Messages API gateway
pub struct AnthropicGateway {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicGateway {
    /// Create from configuration
    pub fn from_config(config: AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(AnthropicConfig::from_env()?)
    }

    fn build_request<'a>(
        conversation: &'a [Turn],
        tools: &'a [ToolDescriptor],
        params: &'a InferenceParams,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &params.model,
            max_tokens: params.max_tokens,
            messages: conversation,
            tools,
            system: params.system.as_deref(),
        }
    }

    /// Keep the text and tool_use blocks; anything else the service adds is
    /// not part of the conversation.
    fn parse_response(body: &str) -> std::result::Result<Vec<ContentBlock>, GatewayError> {
        let response: MessagesResponse =
            serde_json::from_str(body).map_err(|e| GatewayError::malformed(format!("invalid response body: {e}")))?;

        tracing::debug!(stop_reason = ?response.stop_reason, blocks = response.content.len(), "Parsed response");

        response
            .content
            .into_iter()
            .filter(|block| matches!(block.get("type").and_then(|t| t.as_str()), Some("text" | "tool_use")))
            .map(|block| {
                serde_json::from_value(block).map_err(|e| GatewayError::malformed(format!("invalid content block: {e}")))
            })
            .collect()
    }

    /// Map a non-success status to an error kind, keeping the service's own
    /// message when it sent one
    fn classify(status: StatusCode, body: &str) -> GatewayError {
        let message = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
            |_| format!("HTTP {status}: {}", body.trim()),
            |envelope| format!("{} ({})", envelope.error.message, envelope.error.kind),
        );

        match status.as_u16() {
            401 | 403 => GatewayError::auth(message),
            429 => GatewayError::rate_limit(message),
            500..=599 => GatewayError::network(message),
            _ => GatewayError::other(message),
        }
    }
}

#[async_trait]
impl ModelGateway for AnthropicGateway {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn infer(
        &self,
        conversation: &[Turn],
        tools: &[ToolDescriptor],
        params: &InferenceParams,
    ) -> std::result::Result<Vec<ContentBlock>, GatewayError> {
        let request = Self::build_request(conversation, tools, params);

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::timeout(e.to_string())
                } else {
                    GatewayError::network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("reading response body: {e}")))?;

        if !status.is_success() {
            let error = Self::classify(status, &body);
            tracing::warn!(%status, kind = %error.kind, "Messages API request failed");
            return Err(error);
        }

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::error::GatewayErrorKind;

    #[test]
    fn test_config_defaults() {
        let config = AnthropicConfig::default();
        assert_eq!(config.api_version, "2023-06-01");
        assert_eq!(config.endpoint(), "https://api.anthropic.com/v1/messages");

        let config = AnthropicConfig {
            base_url: "http://localhost:8080/".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_request_body_shape() {
        let turns = vec![Turn::user_text("list files in docs")];
        let params = InferenceParams {
            system: Some("You are Capri.".into()),
            ..Default::default()
        };

        let body = serde_json::to_value(AnthropicGateway::build_request(&turns, &[], &params)).unwrap();
        assert_eq!(body["model"], params.model.as_str());
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["system"], "You are Capri.");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_drops_unknown_blocks() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "list_files", "input": {"path": "docs"}}
            ],
            "stop_reason": "tool_use"
        }"#;

        let blocks = AnthropicGateway::parse_response(body).unwrap();
        assert_eq!(
            blocks,
            vec![
                ContentBlock::text("Let me check."),
                ContentBlock::tool_use("toolu_1", "list_files", serde_json::json!({"path": "docs"})),
            ]
        );
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        let err = AnthropicGateway::parse_response("<html>oops</html>").unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::MalformedResponse);
    }

    #[test]
    fn test_classify_status() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let err = AnthropicGateway::classify(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.kind, GatewayErrorKind::Auth);
        assert!(err.message.contains("invalid x-api-key"));

        assert_eq!(
            AnthropicGateway::classify(StatusCode::TOO_MANY_REQUESTS, "").kind,
            GatewayErrorKind::RateLimit
        );
        assert_eq!(
            AnthropicGateway::classify(StatusCode::from_u16(529).unwrap(), "overloaded").kind,
            GatewayErrorKind::Network
        );
        assert_eq!(
            AnthropicGateway::classify(StatusCode::BAD_REQUEST, "{}").kind,
            GatewayErrorKind::Other
        );
    }
}
