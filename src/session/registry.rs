//! Live session tracking
//!
//! Sessions are fully isolated: every entry owns its own transcript and
//! phase, sharing only the (stateless) pipeline shims.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use super::machine::{Conversation, Pipeline, SessionEvent};

/// All sessions currently connected to the gateway
pub struct SessionRegistry {
    pipeline: Arc<Pipeline>,
    greeting: String,
    sessions: RwLock<HashMap<String, Arc<Conversation>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, greeting: impl Into<String>) -> Self {
        Self {
            pipeline,
            greeting: greeting.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a session, replacing any stale entry under the
    /// same id (a reconnect gets a fresh conversation)
    pub async fn create(
        &self,
        session_id: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Arc<Conversation> {
        let session = Arc::new(Conversation::new(
            session_id,
            self.greeting.clone(),
            Arc::clone(&self.pipeline),
            events,
        ));
        let previous = self
            .sessions
            .write()
            .await
            .insert(session_id.to_string(), Arc::clone(&session));
        if previous.is_some() {
            tracing::debug!(session_id, "replaced existing session on reconnect");
        }
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Conversation>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop the registry's reference; any in-flight pipeline finishes
    /// against its own Arc and is then freed
    pub async fn remove(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            tracing::debug!(session_id, "session removed");
        }
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
