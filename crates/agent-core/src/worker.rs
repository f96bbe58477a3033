//! Session Worker
//!
//! Runs a session's rounds on a background task so the caller never blocks
//! on the model or a tool. Commands go in over one channel and
//! [`SessionEvent`]s come back over another; the worker owns the session
//! outright, so nothing else can touch the conversation mid-round.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::event::SessionEvent;
use crate::orchestrator::{EventSender, Orchestrator};
use crate::session::{Session, SessionId};

/// Requests accepted by a session worker
#[derive(Debug)]
pub enum SessionCommand {
    /// Append user text and run rounds to completion
    Submit { text: String, cancel: CancellationToken },

    /// Re-run a failed submission
    Retry { cancel: CancellationToken },

    /// Copy of the session, answered once the worker is idle
    Snapshot(oneshot::Sender<Session>),
}

/// Caller side of a running session worker.
///
/// At most one submission is in flight; the handle refuses another until the
/// terminal event of the current one has been read with [`next_event`].
///
/// [`next_event`]: SessionHandle::next_event
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    in_flight: Option<CancellationToken>,
    task: JoinHandle<Session>,
}

/// Move `session` onto a background task driven by `orchestrator`
pub fn spawn_session(orchestrator: Arc<Orchestrator>, session: Session) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let id = session.id.clone();

    tracing::debug!(session = %id, "Spawning session worker");
    let task = tokio::spawn(worker_loop(orchestrator, session, command_rx, event_tx));

    SessionHandle {
        id,
        commands: command_tx,
        events: event_rx,
        in_flight: None,
        task,
    }
}

async fn worker_loop(
    orchestrator: Arc<Orchestrator>,
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: EventSender,
) -> Session {
    while let Some(command) = commands.recv().await {
        match command {
            SessionCommand::Submit { text, cancel } => {
                match orchestrator.submit(&mut session, &text, &events) {
                    Ok(()) => run_rounds(&orchestrator, &mut session, &events, &cancel).await,
                    Err(e) => reject(&events, &e),
                }
            }
            SessionCommand::Retry { cancel } => match orchestrator.retry(&mut session, &events) {
                Ok(()) => run_rounds(&orchestrator, &mut session, &events, &cancel).await,
                Err(e) => reject(&events, &e),
            },
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(session.clone());
            }
        }
    }

    tracing::debug!(session = %session.id, "Session worker stopped");
    session
}

async fn run_rounds(orchestrator: &Orchestrator, session: &mut Session, events: &EventSender, cancel: &CancellationToken) {
    // Failures were already reported as a Failed event
    if let Err(e) = orchestrator.run(session, events, cancel).await {
        tracing::debug!(session = %session.id, error = %e, "Submission ended with error");
    }
}

fn reject(events: &EventSender, error: &AgentError) {
    let _ = events.send(SessionEvent::Failed {
        message: error.to_string(),
        retryable: false,
    });
}

impl SessionHandle {
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether a submission is still waiting for its terminal event
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Queue user text. Blank text is refused with `EmptyInput` and never
    /// reaches the worker.
    pub fn submit(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }
        self.dispatch(|cancel| SessionCommand::Submit {
            text: text.to_string(),
            cancel,
        })
    }

    /// Re-run the last failed submission
    pub fn retry(&mut self) -> Result<()> {
        self.dispatch(|cancel| SessionCommand::Retry { cancel })
    }

    fn dispatch(&mut self, command: impl FnOnce(CancellationToken) -> SessionCommand) -> Result<()> {
        if self.is_busy() {
            return Err(AgentError::Busy);
        }
        let cancel = CancellationToken::new();
        self.commands
            .send(command(cancel.clone()))
            .map_err(|_| AgentError::WorkerGone)?;
        self.in_flight = Some(cancel);
        Ok(())
    }

    /// Ask the in-flight submission to stop. It still ends with a terminal
    /// event.
    pub fn cancel(&self) {
        if let Some(token) = &self.in_flight {
            tracing::info!(session = %self.id, "Cancelling submission");
            token.cancel();
        }
    }

    /// Next event from the worker; `None` once the worker has stopped
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events.recv().await?;
        if event.is_terminal() {
            self.in_flight = None;
        }
        Some(event)
    }

    /// Read events up to and including the current submission's terminal one
    pub async fn until_terminal(&mut self) -> Result<Vec<SessionEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                return Ok(events);
            }
        }
        Err(AgentError::WorkerGone)
    }

    /// Copy of the session as the worker sees it between submissions
    pub async fn snapshot(&self) -> Result<Session> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot(tx))
            .map_err(|_| AgentError::WorkerGone)?;
        rx.await.map_err(|_| AgentError::WorkerGone)
    }

    /// Stop the worker, cancelling anything in flight, and take the session back
    pub async fn shutdown(self) -> Result<Session> {
        self.cancel();
        drop(self.commands);
        self.task
            .await
            .map_err(|e| AgentError::Other(format!("Session worker failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::orchestrator::{OrchestratorConfig, RoundState};
    use crate::test_support::{Behavior, CannedTool, ScriptedGateway, text, tool_use};
    use crate::tool::ToolRegistry;
    use std::time::Duration;

    fn spawn(gateway: ScriptedGateway, tools: Vec<CannedTool>) -> SessionHandle {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        let orchestrator = Orchestrator::new(Arc::new(gateway), Arc::new(registry), OrchestratorConfig::default());
        spawn_session(Arc::new(orchestrator), Session::new())
    }

    #[tokio::test]
    async fn test_submit_runs_to_done() {
        let mut handle = spawn(
            ScriptedGateway::new([Ok(vec![tool_use("t1", "list_files")]), Ok(vec![text("All listed")])]),
            vec![CannedTool::new("list_files", Behavior::Reply("a\nb".into()))],
        );

        handle.submit("list files in docs").unwrap();
        assert!(handle.is_busy());

        let events = handle.until_terminal().await.unwrap();
        assert_eq!(events.last(), Some(&SessionEvent::Done));
        assert!(events.contains(&SessionEvent::AssistantText { text: "All listed".into() }));
        assert!(!handle.is_busy());

        let session = handle.snapshot().await.unwrap();
        assert_eq!(session.state(), RoundState::Done);
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn test_second_submit_refused_while_busy() {
        let mut handle = spawn(
            ScriptedGateway::new([Ok(vec![text("first")])]).with_delay(Duration::from_millis(50)),
            vec![],
        );

        handle.submit("one").unwrap();
        assert!(matches!(handle.submit("two"), Err(AgentError::Busy)));

        handle.until_terminal().await.unwrap();
        let session = handle.shutdown().await.unwrap();
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_submit_never_reaches_worker() {
        let mut handle = spawn(ScriptedGateway::new([]), vec![]);

        assert!(matches!(handle.submit("   "), Err(AgentError::EmptyInput)));
        assert!(!handle.is_busy());

        let session = handle.snapshot().await.unwrap();
        assert!(session.conversation().is_empty());
        assert_eq!(session.state(), RoundState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_cancel_ends_with_failed_event() {
        let mut handle = spawn(
            ScriptedGateway::new([Ok(vec![tool_use("t1", "sleeper")])]),
            vec![CannedTool::new("sleeper", Behavior::Sleep(Duration::from_secs(5)))],
        );

        handle.submit("sleep").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();

        let events = handle.until_terminal().await.unwrap();
        assert!(matches!(events.last(), Some(SessionEvent::Failed { .. })));

        let session = handle.snapshot().await.unwrap();
        assert_eq!(session.state(), RoundState::Failed);
        assert!(session.conversation().tool_pairing_holds());
    }

    #[tokio::test]
    async fn test_retry_after_gateway_failure() {
        let mut handle = spawn(
            ScriptedGateway::new([Err(GatewayError::network("connection reset")), Ok(vec![text("back")])]),
            vec![],
        );

        handle.submit("hello").unwrap();
        let events = handle.until_terminal().await.unwrap();
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Failed { retryable: true, .. })
        ));

        handle.retry().unwrap();
        let events = handle.until_terminal().await.unwrap();
        assert_eq!(events.last(), Some(&SessionEvent::Done));

        let session = handle.shutdown().await.unwrap();
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_without_failure_is_rejected() {
        let mut handle = spawn(ScriptedGateway::new([]), vec![]);

        handle.retry().unwrap();
        let events = handle.until_terminal().await.unwrap();
        assert!(matches!(events.as_slice(), [SessionEvent::Failed { .. }]));
    }
}
