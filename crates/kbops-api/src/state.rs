//! Application state management
//!
//! Author: hephaex@gmail.com

use kbops_chat::{ChatEngine, ChatSession, Deployment};
use kbops_core::AppConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Chat dispatcher
    pub engine: ChatEngine,
    /// Result of the start-up credential probe, as shown in the UI
    pub credential_status: String,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Chat messages answered
    pub chat_count: AtomicU64,
    /// Cleared when shutdown begins so load balancers stop routing here
    pub is_ready: AtomicBool,
    sessions: RwLock<HashMap<Uuid, ChatSession>>,
}

impl AppState {
    pub fn new(config: AppConfig, engine: ChatEngine, credential_status: impl Into<String>) -> Self {
        Self {
            config,
            engine,
            credential_status: credential_status.into(),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            chat_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// State without AWS clients; chat runs in canned/notice mode
    pub fn offline(config: AppConfig, credential_status: impl Into<String>) -> Self {
        let engine = ChatEngine::offline(config.chat.clone(), deployment(&config));
        Self::new(config, engine, credential_status)
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn get_chat_count(&self) -> u64 {
        self.chat_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub async fn session(&self, id: Uuid) -> Option<ChatSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn has_session(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove a session; false when it did not exist
    pub async fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Append a user message and its reply to session `id`
    ///
    /// A new session is started when `id` is None or no longer exists, so a
    /// reply that was already generated is never thrown away. Starting a
    /// session at capacity evicts the least recently updated one.
    pub async fn record_exchange(&self, id: Option<Uuid>, prompt: &str, reply: &str) -> ChatSession {
        let mut sessions = self.sessions.write().await;

        let mut session = match id.and_then(|id| sessions.remove(&id)) {
            Some(session) => session,
            None => {
                if let Some(lost) = id {
                    tracing::warn!(session = %lost, "session vanished before reply, starting a new one");
                }
                evict_to_capacity(&mut sessions, self.config.server.max_sessions);
                ChatSession::new()
            }
        };

        session.push_user(prompt);
        session.push_assistant(reply);
        sessions.insert(session.id, session.clone());
        self.chat_count.fetch_add(1, Ordering::SeqCst);
        session
    }
}

/// Drop least recently updated sessions until one more fits under `max`
fn evict_to_capacity(sessions: &mut HashMap<Uuid, ChatSession>, max: usize) {
    while sessions.len() >= max.max(1) {
        let Some(oldest) = sessions.values().min_by_key(|s| s.updated_at).map(|s| s.id) else {
            break;
        };
        sessions.remove(&oldest);
        tracing::debug!(session = %oldest, "evicted least recently used session");
    }
}

/// Region and bucket quoted in chat texts
pub fn deployment(config: &AppConfig) -> Deployment {
    Deployment {
        region: config.aws.region.clone(),
        bucket: config.knowledge_base.s3_bucket.clone(),
    }
}
