use std::sync::Arc;

use dashmap::DashMap;

use crate::session::{CallSession, SessionId};

/// Why a session is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The platform closed the media socket or it failed.
    CallClosed,
    /// The realtime connection closed or failed.
    AiClosed,
    /// The process is shutting down.
    Shutdown,
}

/// Liveness set of active call sessions.
///
/// Sessions are inserted when the media socket is accepted and removed exactly
/// once by [`SessionRegistry::teardown`], which also closes both legs.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<CallSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<CallSession>) {
        tracing::debug!(session_id = %session.id(), "registering call session");
        self.sessions.insert(session.id(), session);
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of the live sessions.
    pub fn sessions(&self) -> Vec<Arc<CallSession>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Removes the session and closes both of its connections.
    ///
    /// Returns `false` when the session was already gone.
    pub async fn teardown(&self, id: &SessionId, reason: TeardownReason) -> bool {
        let Some((_, session)) = self.sessions.remove(id) else {
            tracing::trace!(session_id = %id, ?reason, "session already torn down");
            return false;
        };
        tracing::info!(
            session_id = %id,
            stream_id = session.stream_id().unwrap_or("-"),
            ?reason,
            "tearing down call session"
        );
        session.close().await;
        true
    }

    /// Tears down every session.
    pub async fn shutdown(&self) {
        for session in self.sessions() {
            self.teardown(&session.id(), TeardownReason::Shutdown).await;
        }
    }
}
