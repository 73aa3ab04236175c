//! Membership model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Role of the single founding/owning member
pub const ROLE_ADMIN: &str = "admin";
/// Role of every other member
pub const ROLE_MEMBER: &str = "member";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub circle_id: i64,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub blocked: bool,
}

impl Membership {
    /// Active means the member has not left the circle
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}
