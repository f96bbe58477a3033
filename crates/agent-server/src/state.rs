//! Application State

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use agent_core::{
    ContentBlock, GatewayError, InferenceParams, ModelGateway, Orchestrator, Session, SessionHandle, SessionId,
    ToolDescriptor, Turn, spawn_session,
};

/// A session worker shared between requests. Holding the lock means owning
/// the session's input side until the guard drops.
pub type SharedSession = Arc<Mutex<SessionHandle>>;

/// How many sessions the server keeps, and for how long an unused one lives
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub idle_ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 256,
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl SessionLimits {
    /// Read `MAX_SESSIONS` and `SESSION_IDLE_SECS`, keeping defaults for
    /// anything missing or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str| std::env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            max_sessions: read("MAX_SESSIONS")
                .and_then(|n| usize::try_from(n).ok())
                .map_or(defaults.max_sessions, |n| n.max(1)),
            idle_ttl: read("SESSION_IDLE_SECS").map_or(defaults.idle_ttl, Duration::from_secs),
        }
    }
}

/// Every live session is busy or held by a connection and no slot is free
#[derive(Debug)]
pub struct SessionsFull;

struct SessionSlot {
    shared: SharedSession,
    last_used: Instant,
}

impl SessionSlot {
    /// Nobody holds the handle and no submission is running
    fn is_idle(&self) -> bool {
        self.shared.try_lock().is_ok_and(|handle| !handle.is_busy())
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Round loop shared by every session
    pub orchestrator: Arc<Orchestrator>,

    /// Whether a real gateway was configured at startup
    pub gateway_configured: bool,

    pub limits: SessionLimits,

    /// Live sessions, process lifetime only
    sessions: Arc<RwLock<HashMap<SessionId, SessionSlot>>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, gateway_configured: bool) -> Self {
        Self::with_limits(orchestrator, gateway_configured, SessionLimits::default())
    }

    pub fn with_limits(orchestrator: Arc<Orchestrator>, gateway_configured: bool, limits: SessionLimits) -> Self {
        Self {
            orchestrator,
            gateway_configured,
            limits,
            sessions: Arc::default(),
        }
    }

    /// An existing session, without starting one
    pub async fn existing(&self, id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&SessionId::from_string(id))?;
        slot.last_used = Instant::now();
        Some(slot.shared.clone())
    }

    /// Look up a session, or start a new one (under the requested id when
    /// one was given). Starting one first evicts idle sessions past their
    /// TTL, then the least recently used idle one if the map is still full.
    pub async fn session(&self, id: Option<&str>) -> Result<(SessionId, SharedSession), SessionsFull> {
        if let Some(requested) = id {
            if let Some(existing) = self.existing(requested).await {
                return Ok((SessionId::from_string(requested), existing));
            }
        }

        let session = id.map_or_else(Session::new, |id| Session::with_id(SessionId::from_string(id)));
        let id = session.id.clone();

        let mut sessions = self.sessions.write().await;
        if let Some(slot) = sessions.get_mut(&id) {
            slot.last_used = Instant::now();
            return Ok((id, slot.shared.clone()));
        }

        evict_expired(&mut sessions, self.limits.idle_ttl);
        if sessions.len() >= self.limits.max_sessions && !evict_least_recent(&mut sessions) {
            tracing::warn!(sessions = sessions.len(), "Session limit reached, refusing new session");
            return Err(SessionsFull);
        }

        tracing::info!(session = %id, "Starting session");
        let shared = Arc::new(Mutex::new(spawn_session(self.orchestrator.clone(), session)));
        sessions.insert(
            id.clone(),
            SessionSlot {
                shared: shared.clone(),
                last_used: Instant::now(),
            },
        );
        Ok((id, shared))
    }

    /// Forget a session. Its worker stops once the last holder lets go.
    pub async fn remove(&self, id: &str) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(&SessionId::from_string(id));
        removed.map(|slot| {
            if let Ok(handle) = slot.shared.try_lock() {
                handle.cancel();
            }
            tracing::info!(session = %id, "Session removed");
            slot.shared
        })
    }

    /// Drop idle sessions unused for longer than the TTL. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        evict_expired(&mut *self.sessions.write().await, self.limits.idle_ttl)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn evict_expired(sessions: &mut HashMap<SessionId, SessionSlot>, idle_ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|id, slot| {
        let keep = slot.last_used.elapsed() < idle_ttl || !slot.is_idle();
        if !keep {
            tracing::info!(session = %id, "Evicting idle session");
        }
        keep
    });
    before - sessions.len()
}

/// Drop the idle session used longest ago. False when every session is in use.
fn evict_least_recent(sessions: &mut HashMap<SessionId, SessionSlot>) -> bool {
    let oldest = sessions
        .iter()
        .filter(|(_, slot)| slot.is_idle())
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(id, _)| id.clone());

    oldest.is_some_and(|id| {
        tracing::info!(session = %id, "Evicting least recently used session");
        sessions.remove(&id).is_some()
    })
}

/// Stand-in gateway used when no API key is configured. Every request fails
/// with an auth error so the server still starts and reports the problem.
pub struct MissingCredentials;

#[async_trait]
impl ModelGateway for MissingCredentials {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn infer(
        &self,
        _conversation: &[Turn],
        _tools: &[ToolDescriptor],
        _params: &InferenceParams,
    ) -> Result<Vec<ContentBlock>, GatewayError> {
        Err(GatewayError::auth("ANTHROPIC_API_KEY is not set"))
    }
}
