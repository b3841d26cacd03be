//! Session state and the lock-per-owner session store
//!
//! Every owner gets one `Session` behind its own async mutex. Events for
//! distinct owners never contend; two events from the same owner are
//! serialized end-to-end, so a half-finished flow cannot be interleaved
//! by a second message racing it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Where an owner currently is in a multi-step flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    /// No flow in progress
    #[default]
    Idle,
    /// Collecting tag names until `done`
    AddingTag,
    /// Waiting for a URL to file
    WaitingForLink,
    /// URL captured, waiting for a tag choice
    WaitingForTag,
    /// URL captured, waiting for a brand-new tag name
    WaitingForNewTag,
    /// Rename target captured, waiting for the new name
    AwaitingNewTagName,
}

/// Transient per-owner conversation state
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Current position in the state machine
    pub state: ConversationState,
    /// URL captured mid-flow, awaiting a tag
    pub pending_url: Option<String>,
    /// Old tag name captured mid-rename
    pub pending_old_tag: Option<String>,
}

impl Session {
    /// Drop pending values and return to idle
    pub fn reset(&mut self) {
        *self = Session::default();
    }
}

/// In-memory session store keyed by owner id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the owner's session cell, creating a fresh idle session if
    /// absent. Every lookup yields a well-defined session.
    pub async fn get(&self, owner: i64) -> Arc<Mutex<Session>> {
        if let Some(cell) = self.sessions.read().await.get(&owner) {
            return cell.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(owner)
            .or_insert_with(|| Arc::new(Mutex::new(Session::default())))
            .clone()
    }

    /// Number of sessions currently held
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_owner_gets_idle_session() {
        let store = SessionStore::new();
        let cell = store.get(42).await;
        let session = cell.lock().await;

        assert_eq!(session.state, ConversationState::Idle);
        assert!(session.pending_url.is_none());
        assert!(session.pending_old_tag.is_none());
    }

    #[tokio::test]
    async fn test_same_owner_gets_same_cell() {
        let store = SessionStore::new();

        {
            let cell = store.get(42).await;
            let mut session = cell.lock().await;
            session.state = ConversationState::WaitingForLink;
        }

        let cell = store.get(42).await;
        assert_eq!(cell.lock().await.state, ConversationState::WaitingForLink);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let store = SessionStore::new();

        {
            let cell = store.get(1).await;
            cell.lock().await.pending_url = Some("https://a.example".to_string());
        }
        {
            let cell = store.get(2).await;
            cell.lock().await.pending_url = Some("https://b.example".to_string());
        }

        let a = store.get(1).await;
        let b = store.get(2).await;
        assert_eq!(a.lock().await.pending_url.as_deref(), Some("https://a.example"));
        assert_eq!(b.lock().await.pending_url.as_deref(), Some("https://b.example"));
    }

    #[tokio::test]
    async fn test_same_owner_events_are_serialized() {
        let store = Arc::new(SessionStore::new());

        // Two tasks mutate the same owner's session under its mutex; the
        // final state must reflect both writes, never a lost update.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let cell = store.get(7).await;
                let mut session = cell.lock().await;
                let url = session.pending_url.get_or_insert_with(String::new);
                url.push('x');
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let cell = store.get(7).await;
        assert_eq!(cell.lock().await.pending_url.as_deref(), Some("xx"));
    }

    #[tokio::test]
    async fn test_reset_clears_pending_values() {
        let mut session = Session {
            state: ConversationState::WaitingForTag,
            pending_url: Some("https://a.example".to_string()),
            pending_old_tag: Some("news".to_string()),
        };
        session.reset();

        assert_eq!(session.state, ConversationState::Idle);
        assert!(session.pending_url.is_none());
        assert!(session.pending_old_tag.is_none());
    }
}
