//! Newsletter repository

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::models::newsletter::{Newsletter, CreateNewsletterRequest, NEWSLETTER_STATUS_PUBLISHED};
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for newsletters.
///
/// At most one newsletter exists per (circle, cycle); `insert` assigns the
/// next gap-free issue number and fails on a duplicate cycle, which is the
/// enforcement point for compile idempotence.
#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    /// Insert a newsletter, assigning `issue_number` = prior count + 1
    /// inside the same transaction
    async fn insert(&self, request: CreateNewsletterRequest) -> Result<Newsletter, SecondSaturdayError>;

    /// Find the newsletter for a (circle, cycle) pair
    async fn find_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Option<Newsletter>, SecondSaturdayError>;

    /// Published newsletters of a circle, newest first
    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Newsletter>, SecondSaturdayError>;

    /// Count newsletters of a circle
    async fn count_by_circle(&self, circle_id: i64) -> Result<i64, SecondSaturdayError>;

    /// Record the number of recipients after the send completes
    async fn set_recipient_count(&self, id: i64, count: i32) -> Result<(), SecondSaturdayError>;
}

const NEWSLETTER_COLUMNS: &str = "id, circle_id, cycle_id, title, issue_number, sections, submission_count, member_count, recipient_count, status, published_at, created_at";

#[derive(Debug, Clone)]
pub struct PgNewsletterRepository {
    pool: PgPool,
}

impl PgNewsletterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NewsletterRepository for PgNewsletterRepository {
    async fn insert(&self, request: CreateNewsletterRequest) -> Result<Newsletter, SecondSaturdayError> {
        let mut tx = self.pool.begin().await?;

        let (prior,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM newsletters WHERE circle_id = $1"
        )
        .bind(request.circle_id)
        .fetch_one(&mut *tx)
        .await?;

        let newsletter = sqlx::query_as::<_, Newsletter>(
            r#"
            INSERT INTO newsletters (circle_id, cycle_id, title, issue_number, sections, submission_count, member_count, status, published_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, circle_id, cycle_id, title, issue_number, sections, submission_count, member_count, recipient_count, status, published_at, created_at
            "#
        )
        .bind(request.circle_id)
        .bind(&request.cycle_id)
        .bind(request.title)
        .bind(prior as i32 + 1)
        .bind(request.sections)
        .bind(request.submission_count)
        .bind(request.member_count)
        .bind(NEWSLETTER_STATUS_PUBLISHED)
        .bind(request.published_at)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                SecondSaturdayError::NewsletterAlreadyCompiled {
                    circle_id: request.circle_id,
                    cycle_id: request.cycle_id.clone(),
                }
            }
            other => SecondSaturdayError::Database(other),
        })?;

        tx.commit().await?;
        Ok(newsletter)
    }

    async fn find_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Option<Newsletter>, SecondSaturdayError> {
        let newsletter = sqlx::query_as::<_, Newsletter>(
            &format!("SELECT {NEWSLETTER_COLUMNS} FROM newsletters WHERE circle_id = $1 AND cycle_id = $2")
        )
        .bind(circle_id)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(newsletter)
    }

    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Newsletter>, SecondSaturdayError> {
        let newsletters = sqlx::query_as::<_, Newsletter>(
            &format!("SELECT {NEWSLETTER_COLUMNS} FROM newsletters WHERE circle_id = $1 ORDER BY issue_number DESC")
        )
        .bind(circle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(newsletters)
    }

    async fn count_by_circle(&self, circle_id: i64) -> Result<i64, SecondSaturdayError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM newsletters WHERE circle_id = $1")
            .bind(circle_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn set_recipient_count(&self, id: i64, count: i32) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE newsletters SET recipient_count = $2 WHERE id = $1")
            .bind(id)
            .bind(count)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
