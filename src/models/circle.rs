//! Circle and prompt models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Maximum number of active prompts per circle
pub const MAX_PROMPTS: usize = 8;

/// Maximum prompt text length
pub const MAX_PROMPT_LENGTH: usize = 200;

/// Prompts seeded into a freshly created circle
pub const DEFAULT_PROMPTS: [&str; 4] = [
    "What did you do this month?",
    "One Good Thing",
    "On Your Mind",
    "What are you listening to?",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Circle {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub admin_id: i64,
    pub invite_code: String,
    pub timezone: String,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Circle {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prompt {
    pub id: i64,
    pub circle_id: i64,
    pub text: String,
    pub position: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCircleRequest {
    pub name: String,
    pub description: Option<String>,
    pub timezone: String,
    pub admin_id: i64,
    pub invite_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCircleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// One prompt in a replacement set; `id` present means update-in-place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInput {
    pub id: Option<i64>,
    pub text: String,
    pub position: i32,
}
