//! Video repository

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::models::video::{Video, CreateVideoRequest, VIDEO_STATUS_PROCESSING, VIDEO_STATUS_READY, VIDEO_STATUS_ERROR, VIDEO_STATUS_UPLOADING};
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for upload-tracked videos.
///
/// `upload_id` is unique; `asset_id` is attached once by the transcoding
/// webhook and unique afterwards.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Create a video record when an upload starts
    async fn create(&self, request: CreateVideoRequest) -> Result<Video, SecondSaturdayError>;

    /// Find video by upload ID
    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<Video>, SecondSaturdayError>;

    /// Find video by transcoding asset ID
    async fn find_by_asset_id(&self, asset_id: &str) -> Result<Option<Video>, SecondSaturdayError>;

    /// Attach the transcoding asset to the upload-tracked record
    async fn attach_asset(&self, upload_id: &str, asset_id: &str) -> Result<Option<Video>, SecondSaturdayError>;

    /// Record playback data once the asset is ready
    async fn mark_ready(&self, asset_id: &str, playback_id: &str, duration: Option<f64>, aspect_ratio: Option<&str>) -> Result<Option<Video>, SecondSaturdayError>;

    /// Record a transcoding failure
    async fn mark_error(&self, asset_id: &str, error: Option<&str>) -> Result<Option<Video>, SecondSaturdayError>;

    /// Delete all videos of a user (account deletion)
    async fn delete_by_user(&self, user_id: i64) -> Result<u64, SecondSaturdayError>;
}

const VIDEO_COLUMNS: &str = "id, upload_id, asset_id, playback_id, user_id, circle_id, title, duration, aspect_ratio, status, error, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn create(&self, request: CreateVideoRequest) -> Result<Video, SecondSaturdayError> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (upload_id, user_id, circle_id, title, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, upload_id, asset_id, playback_id, user_id, circle_id, title, duration, aspect_ratio, status, error, created_at, updated_at
            "#
        )
        .bind(request.upload_id)
        .bind(request.user_id)
        .bind(request.circle_id)
        .bind(request.title)
        .bind(VIDEO_STATUS_UPLOADING)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<Video>, SecondSaturdayError> {
        let video = sqlx::query_as::<_, Video>(
            &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE upload_id = $1")
        )
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn find_by_asset_id(&self, asset_id: &str) -> Result<Option<Video>, SecondSaturdayError> {
        let video = sqlx::query_as::<_, Video>(
            &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE asset_id = $1")
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn attach_asset(&self, upload_id: &str, asset_id: &str) -> Result<Option<Video>, SecondSaturdayError> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos
            SET asset_id = $2, status = $3, updated_at = $4
            WHERE upload_id = $1
            RETURNING id, upload_id, asset_id, playback_id, user_id, circle_id, title, duration, aspect_ratio, status, error, created_at, updated_at
            "#
        )
        .bind(upload_id)
        .bind(asset_id)
        .bind(VIDEO_STATUS_PROCESSING)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn mark_ready(&self, asset_id: &str, playback_id: &str, duration: Option<f64>, aspect_ratio: Option<&str>) -> Result<Option<Video>, SecondSaturdayError> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos
            SET playback_id = $2, duration = $3, aspect_ratio = $4, status = $5, updated_at = $6
            WHERE asset_id = $1
            RETURNING id, upload_id, asset_id, playback_id, user_id, circle_id, title, duration, aspect_ratio, status, error, created_at, updated_at
            "#
        )
        .bind(asset_id)
        .bind(playback_id)
        .bind(duration)
        .bind(aspect_ratio)
        .bind(VIDEO_STATUS_READY)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn mark_error(&self, asset_id: &str, error: Option<&str>) -> Result<Option<Video>, SecondSaturdayError> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos
            SET status = $2, error = $3, updated_at = $4
            WHERE asset_id = $1
            RETURNING id, upload_id, asset_id, playback_id, user_id, circle_id, title, duration, aspect_ratio, status, error, created_at, updated_at
            "#
        )
        .bind(asset_id)
        .bind(VIDEO_STATUS_ERROR)
        .bind(error)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, SecondSaturdayError> {
        let result = sqlx::query("DELETE FROM videos WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
