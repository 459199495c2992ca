use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{dao::models::SessionStatus, state::game::GameSession};

/// In-memory sessions keyed by id, with a single designated active session.
///
/// Only the command worker mutates the registry; readers may observe it at any time.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, GameSession>,
    active: RwLock<Option<Uuid>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the active session, if any.
    pub async fn active_id(&self) -> Option<Uuid> {
        *self.active.read().await
    }

    /// Clone of the active session, if any.
    pub async fn active(&self) -> Option<GameSession> {
        let id = self.active_id().await?;
        self.get(id)
    }

    /// Clone of a session kept in memory.
    pub fn get(&self, id: Uuid) -> Option<GameSession> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Install a freshly started session as the active one, evicting archived sessions.
    pub async fn activate(&self, session: GameSession) {
        let mut active = self.active.write().await;
        self.sessions
            .retain(|_, existing| existing.status != SessionStatus::Finished);
        *active = Some(session.id);
        self.sessions.insert(session.id, session);
    }

    /// Replace the stored copy of a session with its committed state.
    ///
    /// A finished session stays readable but is no longer the active one.
    pub async fn commit(&self, session: GameSession) {
        let mut active = self.active.write().await;
        if session.status == SessionStatus::Finished && *active == Some(session.id) {
            active.take();
        }
        self.sessions.insert(session.id, session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
