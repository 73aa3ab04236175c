//! Admin reminder and notification preference repositories

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::models::newsletter::{AdminReminder, NotificationPreference};
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for admin reminder records.
///
/// Targeted and bulk reminders share the same rows; `count_for` is the
/// basis of the per-(admin, circle, cycle) cap.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Count reminder records for an (admin, circle, cycle) triple
    async fn count_for(&self, admin_user_id: i64, circle_id: i64, cycle_id: &str) -> Result<i64, SecondSaturdayError>;

    /// Insert a reminder record; `target_user_id` is None for bulk
    async fn insert(&self, circle_id: i64, admin_user_id: i64, target_user_id: Option<i64>, cycle_id: &str) -> Result<AdminReminder, SecondSaturdayError>;

    /// Delete all reminder records of a (circle, cycle); runs after the
    /// newsletter send completes
    async fn delete_for_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<u64, SecondSaturdayError>;
}

/// Persistence contract for notification preferences.
///
/// At most one row per user; an absent row means opted in to everything.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Find the preference row for a user
    async fn find_by_user(&self, user_id: i64) -> Result<Option<NotificationPreference>, SecondSaturdayError>;

    /// Create or overwrite the preference row for a user
    async fn upsert(&self, user_id: i64, submission_reminders: bool, newsletter_ready: bool) -> Result<NotificationPreference, SecondSaturdayError>;
}

#[derive(Debug, Clone)]
pub struct PgReminderRepository {
    pool: PgPool,
}

impl PgReminderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderRepository for PgReminderRepository {
    async fn count_for(&self, admin_user_id: i64, circle_id: i64, cycle_id: &str) -> Result<i64, SecondSaturdayError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM admin_reminders WHERE admin_user_id = $1 AND circle_id = $2 AND cycle_id = $3"
        )
        .bind(admin_user_id)
        .bind(circle_id)
        .bind(cycle_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn insert(&self, circle_id: i64, admin_user_id: i64, target_user_id: Option<i64>, cycle_id: &str) -> Result<AdminReminder, SecondSaturdayError> {
        let reminder = sqlx::query_as::<_, AdminReminder>(
            r#"
            INSERT INTO admin_reminders (circle_id, admin_user_id, target_user_id, cycle_id, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, circle_id, admin_user_id, target_user_id, cycle_id, sent_at
            "#
        )
        .bind(circle_id)
        .bind(admin_user_id)
        .bind(target_user_id)
        .bind(cycle_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(reminder)
    }

    async fn delete_for_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<u64, SecondSaturdayError> {
        let result = sqlx::query("DELETE FROM admin_reminders WHERE circle_id = $1 AND cycle_id = $2")
            .bind(circle_id)
            .bind(cycle_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<NotificationPreference>, SecondSaturdayError> {
        let preference = sqlx::query_as::<_, NotificationPreference>(
            "SELECT id, user_id, submission_reminders, newsletter_ready, created_at, updated_at FROM notification_preferences WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(preference)
    }

    async fn upsert(&self, user_id: i64, submission_reminders: bool, newsletter_ready: bool) -> Result<NotificationPreference, SecondSaturdayError> {
        let preference = sqlx::query_as::<_, NotificationPreference>(
            r#"
            INSERT INTO notification_preferences (user_id, submission_reminders, newsletter_ready, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET submission_reminders = EXCLUDED.submission_reminders,
                newsletter_ready = EXCLUDED.newsletter_ready,
                updated_at = EXCLUDED.updated_at
            RETURNING id, user_id, submission_reminders, newsletter_ready, created_at, updated_at
            "#
        )
        .bind(user_id)
        .bind(submission_reminders)
        .bind(newsletter_ready)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(preference)
    }
}
