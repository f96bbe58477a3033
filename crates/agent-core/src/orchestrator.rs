//! Orchestrator
//!
//! The tool-use loop for one session. A submission appends a user turn, then
//! rounds run back to back: call the gateway, append the assistant turn, run
//! every requested tool in order, append their results as one user turn, and
//! go again until the model answers without asking for tools.
//!
//! ```text
//!  AwaitingInput ──submit──▶ ModelPending ──no tool_use──▶ Done
//!                               │    ▲
//!                      tool_use │    │ results appended
//!                               ▼    │
//!                          ToolsExecuting
//!
//!  ModelPending / ToolsExecuting ──error, cancel, round limit──▶ Failed
//! ```
//!
//! A turn is appended only once it is complete, and every `tool_use` gets
//! exactly one `tool_result` in the next turn, so a failed round always
//! leaves the conversation ready for a retry.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::display::{DEFAULT_MAX_LINES, summarize_input, truncate_for_display};
use crate::error::{AgentError, GatewayError, Result};
use crate::event::SessionEvent;
use crate::gateway::{InferenceParams, ModelGateway};
use crate::message::{ContentBlock, Role, Turn};
use crate::session::Session;
use crate::tool::{ToolDefinition, ToolDescriptor, ToolRegistry};

/// Result content for a tool use naming an unregistered tool
pub const TOOL_NOT_FOUND: &str = "tool not found";

/// Result content for tool uses skipped or interrupted by cancellation
pub const TOOL_CANCELLED: &str = "cancelled";

/// Channel the orchestrator reports progress on
pub type EventSender = UnboundedSender<SessionEvent>;

/// Orchestrator state for a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    AwaitingInput,
    ModelPending,
    ToolsExecuting,
    Done,
    Failed,
}

impl RoundState {
    /// A round is running; new input must wait
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::ModelPending | Self::ToolsExecuting)
    }
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingInput => "awaiting_input",
            Self::ModelPending => "model_pending",
            Self::ToolsExecuting => "tools_executing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Model, token limit and system prompt sent with every request
    pub params: InferenceParams,

    /// Gateway calls allowed per submission before giving up
    pub max_rounds: usize,

    /// Deadline for one gateway call
    pub gateway_timeout: Duration,

    /// Deadline for one tool execution
    pub tool_timeout: Duration,

    /// Lines of tool output shown before the display copy is cut
    pub display_max_lines: usize,
}

pub const DEFAULT_MAX_ROUNDS: usize = 25;

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            params: InferenceParams::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            gateway_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(600),
            display_max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl OrchestratorConfig {
    /// Read overrides from `ANTHROPIC_MODEL`, `MAX_TOKENS`, `MAX_ROUNDS`,
    /// `GATEWAY_TIMEOUT_SECS`, `TOOL_TIMEOUT_SECS` and `MAX_LINES_PER_RESPONSE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            params: InferenceParams {
                model: std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.params.model),
                max_tokens: env_or("MAX_TOKENS", defaults.params.max_tokens),
                system: None,
            },
            max_rounds: env_or("MAX_ROUNDS", defaults.max_rounds),
            gateway_timeout: Duration::from_secs(env_or("GATEWAY_TIMEOUT_SECS", defaults.gateway_timeout.as_secs())),
            tool_timeout: Duration::from_secs(env_or("TOOL_TIMEOUT_SECS", defaults.tool_timeout.as_secs())),
            display_max_lines: env_or("MAX_LINES_PER_RESPONSE", defaults.display_max_lines),
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.params.system = Some(prompt.into());
        self
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

/// How a call to [`Orchestrator::run`] ended, when it did not fail
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// There was no pending input; nothing happened
    Idle,
    /// The model produced a final answer
    Done { reply: String, rounds: usize },
}

/// An owned copy of a `tool_use` block awaiting dispatch
struct PendingToolUse {
    id: String,
    name: String,
    input: serde_json::Value,
}

enum ToolOutcome {
    Output(String),
    Error(String),
    Cancelled,
}

/// Drives rounds against a gateway and a tool registry
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: Arc<ToolRegistry>, mut config: OrchestratorConfig) -> Self {
        config.max_rounds = config.max_rounds.max(1);
        Self { gateway, tools, config }
    }

    /// Create with default configuration
    pub fn with_defaults(gateway: Arc<dyn ModelGateway>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(gateway, tools, OrchestratorConfig::default())
    }

    /// Name of the gateway behind this orchestrator
    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Append a user turn and arm the session for a round.
    ///
    /// Blank input is rejected with [`AgentError::EmptyInput`] and changes
    /// nothing.
    pub fn submit(&self, session: &mut Session, text: &str, events: &EventSender) -> Result<()> {
        if session.state().is_in_flight() {
            return Err(AgentError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::EmptyInput);
        }

        session.append(Turn::user_text(text));
        self.transition(session, events, RoundState::ModelPending);
        Ok(())
    }

    /// Re-arm a failed session whose last turn is still a user turn
    pub fn retry(&self, session: &mut Session, events: &EventSender) -> Result<()> {
        let last_is_user = session.conversation().last().is_some_and(|t| t.role == Role::User);
        if session.state() != RoundState::Failed || !last_is_user {
            return Err(AgentError::Other("Nothing to retry".into()));
        }

        self.transition(session, events, RoundState::ModelPending);
        Ok(())
    }

    /// Submit and run to a terminal state. Blank input is a no-op.
    pub async fn send(
        &self,
        session: &mut Session,
        text: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        match self.submit(session, text, events) {
            Ok(()) => self.run(session, events, cancel).await,
            Err(AgentError::EmptyInput) => Ok(RunOutcome::Idle),
            Err(e) => Err(e),
        }
    }

    /// Run rounds until the model stops asking for tools.
    ///
    /// Does nothing unless the session is in `ModelPending`. On error the
    /// session is left in `Failed` and a `Failed` event has been sent.
    pub async fn run(
        &self,
        session: &mut Session,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        if session.state() != RoundState::ModelPending {
            tracing::debug!(session = %session.id, state = %session.state(), "No pending input, nothing to run");
            return Ok(RunOutcome::Idle);
        }

        let descriptors = self.tools.descriptors();
        let mut rounds = 0;

        loop {
            if rounds >= self.config.max_rounds {
                return Err(self.fail(session, events, AgentError::RoundLimit(self.config.max_rounds)));
            }
            rounds += 1;

            let blocks = match self.call_gateway(session, &descriptors, cancel, rounds).await {
                Ok(blocks) => blocks,
                Err(e) => return Err(self.fail(session, events, e)),
            };

            let turn = Turn::assistant(blocks);
            for text in turn.texts() {
                emit(events, SessionEvent::AssistantText { text: text.to_string() });
            }
            let pending: Vec<PendingToolUse> = turn
                .tool_uses()
                .map(|u| PendingToolUse {
                    id: u.id.to_string(),
                    name: u.name.to_string(),
                    input: u.input.clone(),
                })
                .collect();

            if pending.is_empty() {
                let reply = turn.texts().collect::<Vec<_>>().join("\n");
                if turn.content.is_empty() {
                    tracing::warn!(session = %session.id, round = rounds, "Gateway returned no content blocks");
                } else {
                    session.append(turn);
                }
                self.transition(session, events, RoundState::Done);
                emit(events, SessionEvent::Done);
                tracing::info!(session = %session.id, rounds, "Round finished");
                return Ok(RunOutcome::Done { reply, rounds });
            }

            session.append(turn);
            self.transition(session, events, RoundState::ToolsExecuting);

            let (results, cancelled) = self.dispatch(&pending, events, cancel).await;
            session.append(Turn::tool_results(results));
            debug_assert!(session.conversation().tool_pairing_holds());

            if cancelled {
                return Err(self.fail(session, events, AgentError::Cancelled));
            }
            self.transition(session, events, RoundState::ModelPending);
        }
    }

    async fn call_gateway(
        &self,
        session: &mut Session,
        descriptors: &[ToolDescriptor],
        cancel: &CancellationToken,
        round: usize,
    ) -> Result<Vec<ContentBlock>> {
        session.gateway_calls += 1;
        let turns = session.conversation().turns();

        tracing::info!(
            session = %session.id,
            gateway = self.gateway.name(),
            round,
            turns = turns.len(),
            est_tokens = session.conversation().estimate_tokens(),
            "Calling gateway"
        );

        let request = self.gateway.infer(turns, descriptors, &self.config.params);
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AgentError::Cancelled),
            result = tokio::time::timeout(self.config.gateway_timeout, request) => match result {
                Ok(Ok(blocks)) => Ok(blocks),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(GatewayError::timeout(format!(
                    "no response within {}s",
                    self.config.gateway_timeout.as_secs_f32()
                ))
                .into()),
            },
        }
    }

    /// Run tool uses one at a time, in order. Returns one result block per
    /// tool use and whether cancellation cut the batch short.
    async fn dispatch(
        &self,
        pending: &[PendingToolUse],
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> (Vec<ContentBlock>, bool) {
        let mut results = Vec::with_capacity(pending.len());
        let mut cancelled = false;

        for call in pending {
            let outcome = if cancelled || cancel.is_cancelled() {
                ToolOutcome::Cancelled
            } else if let Some(tool) = self.tools.lookup(&call.name) {
                emit(
                    events,
                    SessionEvent::ToolStarted {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input_summary: summarize_input(&call.input),
                    },
                );
                self.execute_tool(&tool, call, cancel).await
            } else {
                tracing::warn!(tool = %call.name, tool_use_id = %call.id, "Model requested an unregistered tool");
                ToolOutcome::Error(TOOL_NOT_FOUND.into())
            };

            let (content, is_error) = match outcome {
                ToolOutcome::Output(text) => (text, false),
                ToolOutcome::Error(text) => (text, true),
                ToolOutcome::Cancelled => {
                    cancelled = true;
                    (TOOL_CANCELLED.to_string(), true)
                }
            };

            let shown = truncate_for_display(&content, self.config.display_max_lines);
            emit(
                events,
                SessionEvent::ToolFinished {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    summary: shown.text,
                    is_error,
                    truncated: shown.truncated,
                },
            );
            results.push(ContentBlock::tool_result(&call.id, content));
        }

        (results, cancelled)
    }

    /// Everything a tool can do wrong ends up as an error outcome here
    async fn execute_tool(&self, tool: &ToolDefinition, call: &PendingToolUse, cancel: &CancellationToken) -> ToolOutcome {
        tracing::debug!(tool = %call.name, tool_use_id = %call.id, "Executing tool");
        let started = std::time::Instant::now();
        // validate shares the unwind guard with execute
        let execution = AssertUnwindSafe(async {
            tool.validate(&call.input)?;
            let input = serde_json::to_vec(&call.input).map_err(|e| AgentError::ToolExecution(e.to_string()))?;
            tool.execute(&input).await
        })
        .catch_unwind();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => ToolOutcome::Cancelled,
            result = tokio::time::timeout(self.config.tool_timeout, execution) => match result {
                Ok(Ok(Ok(output))) => ToolOutcome::Output(output),
                Ok(Ok(Err(e))) => ToolOutcome::Error(tool_error_text(e)),
                Ok(Err(panic)) => ToolOutcome::Error(panic_text(panic.as_ref())),
                Err(_) => ToolOutcome::Error(format!(
                    "tool '{}' timed out after {}s",
                    call.name,
                    self.config.tool_timeout.as_secs_f32()
                )),
            },
        };

        match &outcome {
            ToolOutcome::Output(_) => {
                tracing::info!(tool = %call.name, elapsed_ms = started.elapsed().as_millis(), "Tool succeeded");
            }
            ToolOutcome::Error(msg) => {
                tracing::warn!(tool = %call.name, elapsed_ms = started.elapsed().as_millis(), error = %msg, "Tool failed");
            }
            ToolOutcome::Cancelled => tracing::info!(tool = %call.name, "Tool cancelled"),
        }
        outcome
    }

    fn transition(&self, session: &mut Session, events: &EventSender, state: RoundState) {
        tracing::debug!(session = %session.id, from = %session.state(), to = %state, "State transition");
        session.set_state(state);
        emit(events, SessionEvent::StateChanged { state });
    }

    fn fail(&self, session: &mut Session, events: &EventSender, error: AgentError) -> AgentError {
        tracing::warn!(session = %session.id, error = %error, "Round failed");
        self.transition(session, events, RoundState::Failed);
        emit(
            events,
            SessionEvent::Failed {
                message: error.to_string(),
                retryable: error.is_retryable(),
            },
        );
        error
    }
}

fn emit(events: &EventSender, event: SessionEvent) {
    // A dropped receiver only means nobody is watching
    let _ = events.send(event);
}

/// The text a model sees for a failed tool: the tool's own message
fn tool_error_text(error: AgentError) -> String {
    match error {
        AgentError::ToolExecution(msg) | AgentError::Other(msg) => msg,
        other => other.to_string(),
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "tool panicked".into(), |msg| format!("tool panicked: {msg}"))
}
