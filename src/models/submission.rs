//! Submission, response and media models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Maximum response text length
pub const MAX_RESPONSE_LENGTH: usize = 500;

/// Maximum media items attached to a single response
pub const MAX_MEDIA_PER_RESPONSE: usize = 3;

/// Text written over a blocked member's responses
pub const REDACTION_MARKER: &str = "[Removed by admin]";

pub const MEDIA_KIND_IMAGE: &str = "image";
pub const MEDIA_KIND_VIDEO: &str = "video";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub circle_id: i64,
    /// Cycle identifier in YYYY-MM format
    pub cycle_id: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    /// Locked submissions accept no further writes
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn status(&self) -> SubmissionStatus {
        if self.is_locked() {
            SubmissionStatus::Submitted
        } else {
            SubmissionStatus::InProgress
        }
    }
}

/// Lifecycle state of a submission. A user with no submission row
/// is reported as `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    NotStarted,
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Response {
    pub id: i64,
    pub submission_id: i64,
    pub prompt_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Media {
    pub id: i64,
    pub response_id: i64,
    pub kind: String,
    pub storage_id: Option<String>,
    pub asset_id: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Zero-based, contiguous within a response
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMediaRequest {
    pub response_id: i64,
    pub kind: String,
    pub storage_id: Option<String>,
    pub asset_id: Option<String>,
    pub thumbnail_url: Option<String>,
}
