//! capri-agent HTTP Server
//!
//! Axum-based server providing REST and WebSocket endpoints over the
//! tool-use orchestrator, with the workspace file, script and video tools
//! registered.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{ModelGateway, Orchestrator, OrchestratorConfig, ToolRegistry};
use agent_runtime::AnthropicGateway;
use agent_tools::{ASSISTANT_PROMPT, Workspace};

use crate::handlers::{chat_handler, chat_stream_handler, delete_session, health_check, list_tools};
use crate::state::{AppState, MissingCredentials, SessionLimits};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize model gateway
    let (gateway, gateway_configured): (Arc<dyn ModelGateway>, bool) = match AnthropicGateway::from_env() {
        Ok(gateway) => {
            tracing::info!("✓ Anthropic gateway configured");
            (Arc::new(gateway), true)
        }
        Err(e) => {
            tracing::warn!("⚠ {} - every request will fail", e);
            tracing::warn!("  Set ANTHROPIC_API_KEY in .env");
            (Arc::new(MissingCredentials), false)
        }
    };

    // Initialize tools
    let workspace = Arc::new(Workspace::from_env()?);
    let mut tools = ToolRegistry::new();
    agent_tools::register_all(&mut tools, &workspace);

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let config = OrchestratorConfig::from_env().with_system_prompt(ASSISTANT_PROMPT);
    tracing::info!(
        model = %config.params.model,
        max_rounds = config.max_rounds,
        "Orchestrator configured"
    );
    let orchestrator = Arc::new(Orchestrator::new(gateway, Arc::new(tools), config));

    // Build application state
    let limits = SessionLimits::from_env();
    tracing::info!(
        max_sessions = limits.max_sessions,
        idle_ttl_secs = limits.idle_ttl.as_secs(),
        "Session limits"
    );
    let state = AppState::with_limits(orchestrator, gateway_configured, limits);
    spawn_session_sweeper(state.clone());
    let app = router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 capri-agent server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health             - Health check");
    tracing::info!("  GET    /api/tools          - List tools");
    tracing::info!("  POST   /api/chat           - Send message");
    tracing::info!("  GET    /api/chat/stream    - WebSocket session");
    tracing::info!("  DELETE /api/sessions/{{id}} - Drop a session");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop sessions that sat idle past their TTL
fn spawn_session_sweeper(state: AppState) {
    let period = (state.limits.idle_ttl / 4).max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle().await;
            if evicted > 0 {
                let remaining = state.session_count().await;
                tracing::info!(evicted, remaining, "Swept idle sessions");
            }
        }
    });
}

fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", get(chat_stream_handler))
        .route("/api/sessions/{id}", delete(delete_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ContentBlock, GatewayError, InferenceParams, ToolDescriptor, Turn};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::handlers::ChatResponse;

    /// Answers every request with the last user text, reversed
    struct ReverseGateway;

    #[async_trait]
    impl ModelGateway for ReverseGateway {
        fn name(&self) -> &str {
            "reverse"
        }

        async fn infer(
            &self,
            conversation: &[Turn],
            _tools: &[ToolDescriptor],
            _params: &InferenceParams,
        ) -> Result<Vec<ContentBlock>, GatewayError> {
            let last = conversation
                .last()
                .and_then(|t| t.texts().next())
                .unwrap_or_default();
            Ok(vec![ContentBlock::text(last.chars().rev().collect::<String>())])
        }
    }

    fn state(gateway: Arc<dyn ModelGateway>) -> AppState {
        let orchestrator = Orchestrator::with_defaults(gateway, Arc::new(ToolRegistry::new()));
        AppState::new(Arc::new(orchestrator), true)
    }

    fn app(gateway: Arc<dyn ModelGateway>) -> Router {
        router(state(gateway))
    }

    async fn post_chat(app: Router, body: serde_json::Value) -> (StatusCode, ChatResponse) {
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_chat_round_trip_keeps_session() {
        let app = app(Arc::new(ReverseGateway));

        let (status, first) = post_chat(app.clone(), serde_json::json!({"message": "hello"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first.replies, ["olleh"]);
        assert_eq!(first.state, agent_core::RoundState::Done);
        assert!(first.error.is_none());

        let (_, second) = post_chat(
            app,
            serde_json::json!({"message": "abc", "session_id": first.session_id}),
        )
        .await;
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.replies, ["cba"]);
    }

    #[tokio::test]
    async fn test_chat_reports_gateway_failure() {
        let (status, response) = post_chat(app(Arc::new(MissingCredentials)), serde_json::json!({"message": "hi"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.state, agent_core::RoundState::Failed);
        assert!(response.error.unwrap().contains("ANTHROPIC_API_KEY is not set"));
    }

    #[tokio::test]
    async fn test_blank_message_is_ignored() {
        let state = state(Arc::new(ReverseGateway));
        let app = router(state.clone());

        for _ in 0..20 {
            let (status, response) = post_chat(app.clone(), serde_json::json!({"message": "   "})).await;
            assert_eq!(status, StatusCode::OK);
            assert!(response.replies.is_empty());
            assert!(response.session_id.is_none());
            assert_eq!(response.state, agent_core::RoundState::AwaitingInput);
        }
        assert_eq!(state.session_count().await, 0);

        // a blank message to a live session reports its state
        let (_, first) = post_chat(app.clone(), serde_json::json!({"message": "hi"})).await;
        let (_, blank) = post_chat(
            app,
            serde_json::json!({"message": "", "session_id": first.session_id}),
        )
        .await;
        assert_eq!(blank.session_id, first.session_id);
        assert_eq!(blank.state, agent_core::RoundState::Done);
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_session_limit_recycles_idle_sessions() {
        let orchestrator = Orchestrator::with_defaults(Arc::new(ReverseGateway), Arc::new(ToolRegistry::new()));
        let state = AppState::with_limits(
            Arc::new(orchestrator),
            true,
            SessionLimits {
                max_sessions: 3,
                ..Default::default()
            },
        );
        let app = router(state.clone());

        for i in 0..10 {
            let (status, response) = post_chat(app.clone(), serde_json::json!({"message": format!("m{i}")})).await;
            assert_eq!(status, StatusCode::OK);
            assert!(response.session_id.is_some());
        }
        assert_eq!(state.session_count().await, 3);
    }

    #[tokio::test]
    async fn test_delete_unknown_session() {
        let response = app(Arc::new(ReverseGateway))
            .oneshot(
                Request::delete("/api/sessions/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
