//! User repository

use async_trait::async_trait;
use common::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::User;

/// User storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, failing with `Conflict` when the email is taken
    async fn insert(&self, user: User) -> StoreResult<User>;

    /// Find a user by exact (case-sensitive) email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
}

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    id_by_email: HashMap<String, Uuid>,
}

/// Process-local user repository
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    table: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    /// Create a new, empty user repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: User) -> StoreResult<User> {
        let mut table = self.table.write().await;

        // Check and insert under one lock so two registrations cannot race
        if table.id_by_email.contains_key(&user.email) {
            return Err(StoreError::Conflict("User".to_string()));
        }

        info!("Creating new user: {}", user.id);
        table.id_by_email.insert(user.email.clone(), user.id);
        table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table
            .id_by_email
            .get(email)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.table.read().await.by_id.get(&id).cloned())
    }
}
