//! HTTP/WebSocket Handlers

use axum::{
    Json,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, RoundState, SessionEvent, ToolDescriptor};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: String,
    pub gateway_configured: bool,
    pub sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// One tool use as shown to the person chatting
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolActivity {
    pub name: String,
    pub summary: String,
    pub is_error: bool,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Absent when a blank message arrived without a live session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub state: RoundState,
    pub replies: Vec<String>,
    pub tools: Vec<ToolActivity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    fn empty(session_id: Option<String>, state: RoundState) -> Self {
        Self {
            session_id,
            state,
            replies: Vec::new(),
            tools: Vec::new(),
            error: None,
        }
    }

    /// Fold one submission's events into a response
    fn from_events(session_id: String, events: Vec<SessionEvent>) -> Self {
        let mut response = Self::empty(Some(session_id), RoundState::AwaitingInput);

        for event in events {
            match event {
                SessionEvent::StateChanged { state } => response.state = state,
                SessionEvent::AssistantText { text } => response.replies.push(text),
                SessionEvent::ToolFinished {
                    name,
                    summary,
                    is_error,
                    truncated,
                    ..
                } => response.tools.push(ToolActivity {
                    name,
                    summary,
                    is_error,
                    truncated,
                }),
                SessionEvent::Failed { message, .. } => response.error = Some(message),
                SessionEvent::ToolStarted { .. } | SessionEvent::Done => {}
            }
        }

        response
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn error_frame(error: &str) -> Message {
    Message::Text(serde_json::json!({"type": "error", "error": error}).to_string().into())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state.orchestrator.gateway_name().to_string(),
        gateway_configured: state.gateway_configured,
        sessions: state.session_count().await,
    })
}

/// Registered tools, as the model sees them
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.orchestrator.tools().descriptors())
}

/// Main chat endpoint: one submission, answered once it finishes
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // Blank input never starts a session
    if payload.message.trim().is_empty() {
        return blank_response(&state, payload.session_id).await;
    }

    let (id, shared) = state.session(payload.session_id.as_deref()).await.map_err(|_| sessions_full())?;

    let mut handle = shared
        .try_lock()
        .map_err(|_| api_error(StatusCode::CONFLICT, AgentError::Busy.user_message(), "BUSY"))?;

    // A WebSocket client that left mid-submission cancelled it; drain the tail
    if handle.is_busy() {
        handle.until_terminal().await.map_err(worker_error)?;
    }

    handle.submit(&payload.message).map_err(worker_error)?;

    let events = handle.until_terminal().await.map_err(worker_error)?;
    let response = ChatResponse::from_events(id.to_string(), events);

    if let Some(error) = &response.error {
        tracing::warn!(session = %id, error = %error, "Submission failed");
    }
    Ok(Json(response))
}

/// Current state of an existing session, or an empty answer with no session
async fn blank_response(state: &AppState, session_id: Option<String>) -> Result<Json<ChatResponse>, ApiError> {
    let existing = match session_id.as_deref() {
        Some(id) => state.existing(id).await,
        None => None,
    };
    let Some(shared) = existing else {
        return Ok(Json(ChatResponse::empty(None, RoundState::AwaitingInput)));
    };

    let handle = shared
        .try_lock()
        .map_err(|_| api_error(StatusCode::CONFLICT, AgentError::Busy.user_message(), "BUSY"))?;
    let session = handle.snapshot().await.map_err(worker_error)?;
    Ok(Json(ChatResponse::empty(Some(session.id.to_string()), session.state())))
}

fn sessions_full() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Too many active sessions. Please try again later.",
        "SESSION_LIMIT",
    )
}

fn worker_error(e: AgentError) -> ApiError {
    tracing::error!(error = %e, "Session worker error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "AGENT_ERROR")
}

/// Drop a session
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    match state.remove(&id).await {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// WebSocket chat. Each text frame is a submission, `/cancel` stops the
/// current one, and every session event is sent back as JSON.
pub async fn chat_stream_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state, params.session_id))
}

async fn handle_stream(socket: WebSocket, state: AppState, session_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let Ok((id, shared)) = state.session(session_id.as_deref()).await else {
        let _ = sender.send(error_frame("Too many active sessions. Please try again later.")).await;
        return;
    };

    let Ok(mut handle) = shared.try_lock_owned() else {
        let _ = sender.send(error_frame(&AgentError::Busy.user_message())).await;
        return;
    };

    if handle.is_busy() && handle.until_terminal().await.is_err() {
        let _ = sender.send(error_frame(&AgentError::WorkerGone.user_message())).await;
        return;
    }

    let hello = serde_json::json!({"type": "session", "session_id": id.to_string()});
    if sender.send(Message::Text(hello.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => continue,
                };

                let text = text.as_str().trim();
                if text == "/cancel" {
                    handle.cancel();
                    continue;
                }
                match handle.submit(text) {
                    Ok(()) | Err(AgentError::EmptyInput) => {}
                    Err(e) => {
                        if sender.send(error_frame(&e.user_message())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Some(event) = handle.next_event(), if handle.is_busy() => {
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    handle.cancel();
    tracing::debug!(session = %id, "WebSocket closed");
}
