//! Session model and related functionality

use chrono::{DateTime, Utc};
use common::{ChatMessage, GeneratedCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SESSION_NAME: &str = "New Session";

/// Conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub name: String,
    /// Conversation order; never reordered
    pub chat_history: Vec<ChatMessage>,
    pub generated_code: Option<GeneratedCode>,
    pub ui_editor_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session owned by `user_id`
    pub fn new(id: String, user_id: Uuid, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            name: name.unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string()),
            chat_history: Vec::new(),
            generated_code: None,
            ui_editor_state: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `updated_at` without ever moving it backwards
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

/// New session creation payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSession {
    pub name: Option<String>,
}

/// Session update payload
///
/// Every present field replaces the stored value as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSession {
    pub name: Option<String>,
    pub chat_history: Option<Vec<ChatMessage>>,
    pub generated_code: Option<GeneratedCode>,
    pub ui_editor_state: Option<serde_json::Value>,
}
