//! Video model for upload-tracked transcoding assets

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const VIDEO_STATUS_UPLOADING: &str = "uploading";
pub const VIDEO_STATUS_PROCESSING: &str = "processing";
pub const VIDEO_STATUS_READY: &str = "ready";
pub const VIDEO_STATUS_ERROR: &str = "error";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: i64,
    pub upload_id: String,
    pub asset_id: Option<String>,
    pub playback_id: Option<String>,
    pub user_id: i64,
    pub circle_id: Option<i64>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoRequest {
    pub upload_id: String,
    pub user_id: i64,
    pub circle_id: Option<i64>,
    pub title: Option<String>,
}
