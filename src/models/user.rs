//! User model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    /// Stable external identity subject (unique)
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub avatar_storage_id: Option<String>,
    pub timezone: Option<String>,
    pub push_player_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name shown in newsletters, falling back to email
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.email.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub avatar_storage_id: Option<String>,
    pub timezone: Option<String>,
}
