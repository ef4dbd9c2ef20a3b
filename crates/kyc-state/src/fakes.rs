//! In-memory fakes for storage traits (testing only)
//!
//! `MemorySessionStore` satisfies the `SessionStore` contract without
//! touching the filesystem.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{Session, SessionId};
use crate::storage_traits::*;

/// In-memory session store backed by a `HashMap<SessionId, Session>`.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> StorageResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session.session_id) {
            return Err(StorageError::SessionExists {
                session_id: session.session_id.to_string(),
            });
        }
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> StorageResult<Session> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(session_id))
    }

    async fn update(&self, session: &Session) -> StorageResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let slot = sessions
            .get_mut(&session.session_id)
            .ok_or_else(|| StorageError::not_found(&session.session_id))?;
        *slot = session.clone();
        Ok(())
    }

    async fn update_with(
        &self,
        session_id: &SessionId,
        mutation: SessionMutation,
    ) -> StorageResult<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        let slot = sessions
            .get_mut(session_id)
            .ok_or_else(|| StorageError::not_found(session_id))?;
        let mut draft = slot.clone();
        mutation(&mut draft)?;
        *slot = draft.clone();
        Ok(draft)
    }

    async fn list(&self) -> StorageResult<Vec<Session>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.values().cloned().collect())
    }
}
