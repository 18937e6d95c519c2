//! Session repository

use async_trait::async_trait;
use chrono::Utc;
use common::{ChatMessage, StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Session, UpdateSession};

/// Conversation session storage
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Return the session, creating an empty one owned by `user_id` if unseen
    ///
    /// An existing session is returned as is, whoever owns it.
    async fn get_or_create(&self, id: &str, user_id: Uuid) -> StoreResult<Session>;

    /// Create a session under a freshly generated ID
    async fn create(&self, user_id: Uuid, name: Option<String>) -> StoreResult<Session>;

    /// Get a session by ID
    async fn get(&self, id: &str) -> StoreResult<Option<Session>>;

    /// Append a message with a server-assigned timestamp
    ///
    /// Returns `false` without doing anything when the session is absent.
    async fn append_message(&self, id: &str, message: ChatMessage) -> StoreResult<bool>;

    /// Replace the fields present in `update`
    async fn update(&self, id: &str, update: UpdateSession) -> StoreResult<Session>;

    /// Delete a session, returning whether it existed
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// All sessions owned by `user_id`, in creation order
    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Session>>;
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    order: Vec<String>,
}

impl SessionTable {
    fn insert(&mut self, session: Session) -> Session {
        self.order.push(session.id.clone());
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }
}

/// Process-local session repository
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    table: Arc<RwLock<SessionTable>>,
}

impl InMemorySessionRepository {
    /// Create a new, empty session repository
    pub fn new() -> Self {
        Self::default()
    }
}

/// Generate a new session ID
pub fn generate_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_or_create(&self, id: &str, user_id: Uuid) -> StoreResult<Session> {
        let mut table = self.table.write().await;
        if let Some(session) = table.sessions.get(id) {
            return Ok(session.clone());
        }

        info!("Creating session {} on first use for user {}", id, user_id);
        Ok(table.insert(Session::new(id.to_string(), user_id, None)))
    }

    async fn create(&self, user_id: Uuid, name: Option<String>) -> StoreResult<Session> {
        let mut table = self.table.write().await;
        let mut id = generate_session_id();
        while table.sessions.contains_key(&id) {
            id = generate_session_id();
        }

        info!("Creating session {} for user {}", id, user_id);
        Ok(table.insert(Session::new(id, user_id, name)))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.table.read().await.sessions.get(id).cloned())
    }

    async fn append_message(&self, id: &str, mut message: ChatMessage) -> StoreResult<bool> {
        let mut table = self.table.write().await;
        let Some(session) = table.sessions.get_mut(id) else {
            debug!("Ignoring message for unknown session {}", id);
            return Ok(false);
        };

        message.timestamp = Some(Utc::now());
        session.chat_history.push(message);
        session.touch();
        Ok(true)
    }

    async fn update(&self, id: &str, update: UpdateSession) -> StoreResult<Session> {
        let mut table = self.table.write().await;
        let session = table
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound("Session".to_string()))?;

        if let Some(name) = update.name {
            session.name = name;
        }
        if let Some(chat_history) = update.chat_history {
            session.chat_history = chat_history;
        }
        if let Some(generated_code) = update.generated_code {
            session.generated_code = Some(generated_code);
        }
        if let Some(ui_editor_state) = update.ui_editor_state {
            session.ui_editor_state = Some(ui_editor_state);
        }
        session.touch();

        Ok(session.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut table = self.table.write().await;
        if table.sessions.remove(id).is_none() {
            return Ok(false);
        }

        table.order.retain(|existing| existing != id);
        info!("Deleted session {}", id);
        Ok(true)
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Session>> {
        let table = self.table.read().await;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.sessions.get(id))
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{GeneratedCode, Role};

    #[tokio::test]
    async fn test_get_or_create_is_lazy_and_stable() {
        let repository = InMemorySessionRepository::new();
        let owner = Uuid::new_v4();

        let created = repository.get_or_create("abc", owner).await.unwrap();
        assert_eq!(created.id, "abc");
        assert_eq!(created.user_id, owner);
        assert!(created.chat_history.is_empty());

        // A second caller gets the existing session, ownership unchanged
        let other = Uuid::new_v4();
        let fetched = repository.get_or_create("abc", other).await.unwrap();
        assert_eq!(fetched.user_id, owner);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_create_generates_unique_ids() {
        let repository = InMemorySessionRepository::new();
        let owner = Uuid::new_v4();

        let first = repository.create(owner, None).await.unwrap();
        let second = repository.create(owner, Some("Buttons".to_string())).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("session_"));
        assert_eq!(first.name, "New Session");
        assert_eq!(second.name, "Buttons");
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_bumps_updated_at() {
        let repository = InMemorySessionRepository::new();
        let session = repository.create(Uuid::new_v4(), None).await.unwrap();

        let mut last_updated = session.updated_at;
        for i in 0..10 {
            let message = if i % 2 == 0 {
                ChatMessage::user(format!("message {i}"))
            } else {
                ChatMessage::assistant(format!("message {i}"))
            };
            assert!(repository.append_message(&session.id, message).await.unwrap());

            let current = repository.get(&session.id).await.unwrap().unwrap();
            assert!(current.updated_at >= last_updated);
            last_updated = current.updated_at;
        }

        let stored = repository.get(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_history.len(), 10);
        for (i, message) in stored.chat_history.iter().enumerate() {
            assert_eq!(message.content, format!("message {i}"));
            assert!(message.timestamp.is_some());
        }
        assert_eq!(stored.chat_history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_append_to_missing_session_is_noop() {
        let repository = InMemorySessionRepository::new();
        let appended = repository
            .append_message("missing", ChatMessage::user("hi"))
            .await
            .unwrap();

        assert!(!appended);
        assert!(repository.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_generated_code_whole() {
        let repository = InMemorySessionRepository::new();
        let session = repository.create(Uuid::new_v4(), None).await.unwrap();

        let first = GeneratedCode {
            tsx: "const A = 1".to_string(),
            css: ".a {}".to_string(),
        };
        repository
            .update(
                &session.id,
                UpdateSession {
                    generated_code: Some(first),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = GeneratedCode {
            tsx: "const B = 2".to_string(),
            css: String::new(),
        };
        let updated = repository
            .update(
                &session.id,
                UpdateSession {
                    generated_code: Some(second.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.generated_code, Some(second));
        assert_eq!(updated.name, "New Session");
    }

    #[tokio::test]
    async fn test_update_missing_session_is_not_found() {
        let repository = InMemorySessionRepository::new();
        let result = repository.update("missing", UpdateSession::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_user_in_creation_order() {
        let repository = InMemorySessionRepository::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first = repository.create(owner, None).await.unwrap();
        repository.create(other, None).await.unwrap();
        let third = repository.get_or_create("named", owner).await.unwrap();
        let fourth = repository.create(owner, None).await.unwrap();

        assert!(repository.delete(&third.id).await.unwrap());
        assert!(!repository.delete(&third.id).await.unwrap());

        let ids: Vec<String> = repository
            .list_by_user(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|session| session.id)
            .collect();
        assert_eq!(ids, vec![first.id, fourth.id]);
    }
}
