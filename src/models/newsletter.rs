//! Newsletter, reminder and notification preference models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Maximum admin reminders per (admin, circle, cycle)
pub const MAX_ADMIN_REMINDERS: i64 = 3;

pub const NEWSLETTER_STATUS_PUBLISHED: &str = "published";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Newsletter {
    pub id: i64,
    pub circle_id: i64,
    pub cycle_id: String,
    pub title: String,
    /// Strictly increasing and gap-free per circle
    pub issue_number: i32,
    /// Serialized `{"sections": [...]}` document
    pub sections: serde_json::Value,
    pub submission_count: i32,
    pub member_count: i32,
    pub recipient_count: Option<i32>,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNewsletterRequest {
    pub circle_id: i64,
    pub cycle_id: String,
    pub title: String,
    pub sections: serde_json::Value,
    pub submission_count: i32,
    pub member_count: i32,
    pub published_at: DateTime<Utc>,
}

/// One prompt section of a compiled newsletter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsletterSection {
    pub prompt_title: String,
    pub responses: Vec<SectionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionResponse {
    pub member_name: String,
    pub text: String,
    pub media: Vec<SectionMedia>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionMedia {
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminReminder {
    pub id: i64,
    pub circle_id: i64,
    pub admin_user_id: i64,
    /// None means a bulk reminder to all non-submitters
    pub target_user_id: Option<i64>,
    pub cycle_id: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationPreference {
    pub id: i64,
    pub user_id: i64,
    pub submission_reminders: bool,
    pub newsletter_ready: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
