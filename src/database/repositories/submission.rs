//! Submission, response and media repository

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::submission::{Submission, Response, Media, AddMediaRequest};
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for submissions and their responses/media.
///
/// At most one submission exists per (user, circle, cycle) and at most one
/// response per (submission, prompt); the corresponding `find_*` lookups
/// return at most one row. Multi-row mutations that must be atomic (response
/// upsert with submission touch, media removal with re-pack, the redaction
/// cascade) are single methods here.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Insert a submission row for the triple
    async fn create(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Submission, SecondSaturdayError>;

    /// Find submission by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Submission>, SecondSaturdayError>;

    /// Find the single submission for a (user, circle, cycle) triple
    async fn find_by_user_circle_cycle(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Option<Submission>, SecondSaturdayError>;

    /// All submissions of a circle for a cycle
    async fn list_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Vec<Submission>, SecondSaturdayError>;

    /// All submissions that have not been locked yet, across all circles
    async fn list_unlocked(&self) -> Result<Vec<Submission>, SecondSaturdayError>;

    /// Set `locked_at`; when `stamp_submitted` is true and `submitted_at`
    /// is unset, stamp it too
    async fn lock(&self, id: i64, now: DateTime<Utc>, stamp_submitted: bool) -> Result<(), SecondSaturdayError>;

    /// Create or overwrite the single response for (submission, prompt),
    /// touching the submission's `updated_at` in the same transaction
    async fn upsert_response(&self, submission_id: i64, prompt_id: i64, text: &str) -> Result<Response, SecondSaturdayError>;

    /// Find the response for a (submission, prompt) pair
    async fn find_response(&self, submission_id: i64, prompt_id: i64) -> Result<Option<Response>, SecondSaturdayError>;

    /// Find response by ID
    async fn find_response_by_id(&self, id: i64) -> Result<Option<Response>, SecondSaturdayError>;

    /// All responses of a submission
    async fn list_responses(&self, submission_id: i64) -> Result<Vec<Response>, SecondSaturdayError>;

    /// Attach a media item at the given position
    async fn add_media(&self, request: AddMediaRequest, position: i32) -> Result<Media, SecondSaturdayError>;

    /// Find media by ID
    async fn find_media(&self, id: i64) -> Result<Option<Media>, SecondSaturdayError>;

    /// Media items of a response, ordered by position
    async fn list_media(&self, response_id: i64) -> Result<Vec<Media>, SecondSaturdayError>;

    /// Delete a media item and re-pack remaining positions to stay
    /// contiguous, as one atomic operation
    async fn remove_media(&self, id: i64) -> Result<(), SecondSaturdayError>;

    /// Overwrite every response text of the user in the circle with the
    /// redaction marker and delete all media rows of those responses, as one
    /// atomic operation. Returns the storage ids of the deleted media so the
    /// caller can delete the stored objects after commit.
    async fn redact_member_content(&self, user_id: i64, circle_id: i64, marker: &str) -> Result<Vec<String>, SecondSaturdayError>;

    /// Delete every submission, response and media row of the user across
    /// all circles (account deletion), returning deleted storage ids
    async fn delete_all_for_user(&self, user_id: i64) -> Result<Vec<String>, SecondSaturdayError>;
}

const SUBMISSION_COLUMNS: &str = "id, user_id, circle_id, cycle_id, submitted_at, locked_at, created_at, updated_at";
const RESPONSE_COLUMNS: &str = "id, submission_id, prompt_id, text, created_at, updated_at";
const MEDIA_COLUMNS: &str = "id, response_id, kind, storage_id, asset_id, thumbnail_url, position, created_at";

#[derive(Debug, Clone)]
pub struct PgSubmissionRepository {
    pool: PgPool,
}

impl PgSubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for PgSubmissionRepository {
    async fn create(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Submission, SecondSaturdayError> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (user_id, circle_id, cycle_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, user_id, circle_id, cycle_id, submitted_at, locked_at, created_at, updated_at
            "#
        )
        .bind(user_id)
        .bind(circle_id)
        .bind(cycle_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Submission>, SecondSaturdayError> {
        let submission = sqlx::query_as::<_, Submission>(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1")
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn find_by_user_circle_cycle(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Option<Submission>, SecondSaturdayError> {
        let submission = sqlx::query_as::<_, Submission>(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE user_id = $1 AND circle_id = $2 AND cycle_id = $3")
        )
        .bind(user_id)
        .bind(circle_id)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn list_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Vec<Submission>, SecondSaturdayError> {
        let submissions = sqlx::query_as::<_, Submission>(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE circle_id = $1 AND cycle_id = $2 ORDER BY created_at ASC")
        )
        .bind(circle_id)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    async fn list_unlocked(&self) -> Result<Vec<Submission>, SecondSaturdayError> {
        let submissions = sqlx::query_as::<_, Submission>(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE locked_at IS NULL ORDER BY created_at ASC")
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    async fn lock(&self, id: i64, now: DateTime<Utc>, stamp_submitted: bool) -> Result<(), SecondSaturdayError> {
        if stamp_submitted {
            sqlx::query(
                "UPDATE submissions SET locked_at = $2, submitted_at = COALESCE(submitted_at, $2), updated_at = $2 WHERE id = $1"
            )
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE submissions SET locked_at = $2, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn upsert_response(&self, submission_id: i64, prompt_id: i64, text: &str) -> Result<Response, SecondSaturdayError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let response = sqlx::query_as::<_, Response>(
            r#"
            INSERT INTO responses (submission_id, prompt_id, text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (submission_id, prompt_id) DO UPDATE
            SET text = EXCLUDED.text, updated_at = EXCLUDED.updated_at
            RETURNING id, submission_id, prompt_id, text, created_at, updated_at
            "#
        )
        .bind(submission_id)
        .bind(prompt_id)
        .bind(text)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE submissions SET updated_at = $2 WHERE id = $1")
            .bind(submission_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(response)
    }

    async fn find_response(&self, submission_id: i64, prompt_id: i64) -> Result<Option<Response>, SecondSaturdayError> {
        let response = sqlx::query_as::<_, Response>(
            &format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE submission_id = $1 AND prompt_id = $2")
        )
        .bind(submission_id)
        .bind(prompt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(response)
    }

    async fn find_response_by_id(&self, id: i64) -> Result<Option<Response>, SecondSaturdayError> {
        let response = sqlx::query_as::<_, Response>(
            &format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = $1")
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(response)
    }

    async fn list_responses(&self, submission_id: i64) -> Result<Vec<Response>, SecondSaturdayError> {
        let responses = sqlx::query_as::<_, Response>(
            &format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE submission_id = $1 ORDER BY created_at ASC")
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(responses)
    }

    async fn add_media(&self, request: AddMediaRequest, position: i32) -> Result<Media, SecondSaturdayError> {
        let media = sqlx::query_as::<_, Media>(
            r#"
            INSERT INTO media (response_id, kind, storage_id, asset_id, thumbnail_url, position, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, response_id, kind, storage_id, asset_id, thumbnail_url, position, created_at
            "#
        )
        .bind(request.response_id)
        .bind(request.kind)
        .bind(request.storage_id)
        .bind(request.asset_id)
        .bind(request.thumbnail_url)
        .bind(position)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(media)
    }

    async fn find_media(&self, id: i64) -> Result<Option<Media>, SecondSaturdayError> {
        let media = sqlx::query_as::<_, Media>(
            &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1")
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    async fn list_media(&self, response_id: i64) -> Result<Vec<Media>, SecondSaturdayError> {
        let media = sqlx::query_as::<_, Media>(
            &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE response_id = $1 ORDER BY position ASC")
        )
        .bind(response_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(media)
    }

    async fn remove_media(&self, id: i64) -> Result<(), SecondSaturdayError> {
        let mut tx = self.pool.begin().await?;

        let response_id: Option<(i64,)> = sqlx::query_as("DELETE FROM media WHERE id = $1 RETURNING response_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some((response_id,)) = response_id {
            let remaining = sqlx::query_as::<_, Media>(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE response_id = $1 ORDER BY position ASC")
            )
            .bind(response_id)
            .fetch_all(&mut *tx)
            .await?;

            for (index, item) in remaining.iter().enumerate() {
                let packed = index as i32;
                if item.position != packed {
                    sqlx::query("UPDATE media SET position = $2 WHERE id = $1")
                        .bind(item.id)
                        .bind(packed)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn redact_member_content(&self, user_id: i64, circle_id: i64, marker: &str) -> Result<Vec<String>, SecondSaturdayError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE responses
            SET text = $3, updated_at = $4
            WHERE submission_id IN (
                SELECT id FROM submissions WHERE user_id = $1 AND circle_id = $2
            )
            "#
        )
        .bind(user_id)
        .bind(circle_id)
        .bind(marker)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let storage_ids: Vec<(Option<String>,)> = sqlx::query_as(
            r#"
            DELETE FROM media
            WHERE response_id IN (
                SELECT r.id FROM responses r
                JOIN submissions s ON s.id = r.submission_id
                WHERE s.user_id = $1 AND s.circle_id = $2
            )
            RETURNING storage_id
            "#
        )
        .bind(user_id)
        .bind(circle_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(storage_ids.into_iter().filter_map(|(id,)| id).collect())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<Vec<String>, SecondSaturdayError> {
        let mut tx = self.pool.begin().await?;

        let storage_ids: Vec<(Option<String>,)> = sqlx::query_as(
            r#"
            DELETE FROM media
            WHERE response_id IN (
                SELECT r.id FROM responses r
                JOIN submissions s ON s.id = r.submission_id
                WHERE s.user_id = $1
            )
            RETURNING storage_id
            "#
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM responses WHERE submission_id IN (SELECT id FROM submissions WHERE user_id = $1)"
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM submissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(storage_ids.into_iter().filter_map(|(id,)| id).collect())
    }
}
