use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::session::store::{Session, SessionStore, SessionStoreError};

/// In-memory implementation of SessionStore
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    /// Thread-safe slot for the current session
    current: Arc<RwLock<Option<Session>>>,
}

impl InMemorySessionStore {
    /// Create an empty InMemorySessionStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a session
    pub fn with_session(session: Session) -> Self {
        Self {
            current: Arc::new(RwLock::new(Some(session))),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn current_session(&self) -> Result<Option<Session>, SessionStoreError> {
        let current = self.current.read().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(current.clone())
    }

    async fn save_session(&self, session: Session) -> Result<(), SessionStoreError> {
        let mut current = self.current.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        debug!("Saved session for user {}", session.user_id);
        *current = Some(session);
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), SessionStoreError> {
        let mut current = self.current.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })?;

        if let Some(session) = current.take() {
            debug!("Cleared session for user {}", session.user_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::test;

    fn session(token: &str) -> Session {
        Session::new("7", "Grace", "grace@example.com", token, "refresh")
    }

    #[test]
    async fn test_empty_store() {
        let store = InMemorySessionStore::new();
        assert!(store.current_session().await.unwrap().is_none());
        assert!(store.access_token().await.unwrap().is_none());
    }

    #[test]
    async fn test_save_and_read_session() {
        let store = InMemorySessionStore::new();
        store.save_session(session("token-1")).await.unwrap();

        let current = store.current_session().await.unwrap().unwrap();
        assert_eq!(current.user_id, "7");
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("token-1"));
    }

    #[test]
    async fn test_rotation_replaces_value() {
        let store = InMemorySessionStore::with_session(session("token-1"));

        let held = store.current_session().await.unwrap().unwrap();
        let rotated = held.clone().with_tokens("token-2", "refresh-2");
        store.save_session(rotated).await.unwrap();

        assert_eq!(held.access_token, "token-1");
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("token-2"));
    }

    #[test]
    async fn test_empty_token_counts_as_absent() {
        let store = InMemorySessionStore::with_session(session(""));
        assert!(store.current_session().await.unwrap().is_some());
        assert!(store.access_token().await.unwrap().is_none());
    }

    #[test]
    async fn test_clear_session() {
        let store = InMemorySessionStore::with_session(session("token-1"));
        store.clear_session().await.unwrap();
        assert!(store.current_session().await.unwrap().is_none());

        // Clearing twice is fine
        store.clear_session().await.unwrap();
    }
}
