//! Request and response bodies of the gateway API

use chrono::{DateTime, Utc};
use common::{ChatMessage, GeneratedCode};
use serde::{Deserialize, Serialize};

/// Account as returned by `/auth/*`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub access_token: String,
    pub user: Account,
}

/// Session as stored by the gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub chat_history: Vec<ChatMessage>,
    pub generated_code: Option<GeneratedCode>,
    pub ui_editor_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial session update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<ChatMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<GeneratedCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_editor_state: Option<serde_json::Value>,
}
