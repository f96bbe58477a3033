//! Scripted gateway and canned tools shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AgentError, GatewayError, Result};
use crate::gateway::{InferenceParams, ModelGateway};
use crate::message::{ContentBlock, Turn};
use crate::tool::{ParameterSchema, Tool, ToolDescriptor, ToolSchema};

/// Replays queued responses in order; records every request it sees.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<std::result::Result<Vec<ContentBlock>, GatewayError>>>,
    seen: Mutex<Vec<Vec<Turn>>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<Vec<ContentBlock>, GatewayError>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Conversation snapshot sent with the n-th call
    pub fn request(&self, n: usize) -> Vec<Turn> {
        self.seen.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn infer(
        &self,
        conversation: &[Turn],
        _tools: &[ToolDescriptor],
        _params: &InferenceParams,
    ) -> std::result::Result<Vec<ContentBlock>, GatewayError> {
        self.seen.lock().unwrap().push(conversation.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![ContentBlock::text("script exhausted")]))
    }
}

/// What a `CannedTool` does when executed
#[derive(Clone)]
pub enum Behavior {
    Reply(String),
    Fail(String),
    Panic,
    /// Panics while checking its input, before `execute` is reached
    PanicInValidate,
    Sleep(Duration),
}

/// A tool with fixed behaviour that counts its invocations
pub struct CannedTool {
    name: String,
    behavior: Behavior,
    pub invocations: Arc<AtomicUsize>,
}

impl CannedTool {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Tool for CannedTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: format!("Canned tool {}", self.name),
            parameters: vec![ParameterSchema::string("path", "Any path")],
            has_side_effects: true,
        }
    }

    fn validate(&self, _input: &serde_json::Value) -> Result<()> {
        if matches!(self.behavior, Behavior::PanicInValidate) {
            panic!("validator blew up");
        }
        Ok(())
    }

    async fn execute(&self, _input: &[u8]) -> Result<String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Fail(msg) => Err(AgentError::ToolExecution(msg.clone())),
            Behavior::Panic | Behavior::PanicInValidate => panic!("tool blew up"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(*d).await;
                Ok("woke up".into())
            }
        }
    }
}

pub fn text(s: &str) -> ContentBlock {
    ContentBlock::text(s)
}

pub fn tool_use(id: &str, name: &str) -> ContentBlock {
    ContentBlock::tool_use(id, name, serde_json::json!({"path": "docs"}))
}
