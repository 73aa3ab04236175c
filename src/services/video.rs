//! Video upload tracking and transcoding webhook handling
//!
//! The transcoding provider reports progress through a webhook carrying one
//! of three event kinds. The payload is authenticated with HMAC-SHA256 over
//! `"{timestamp}.{body}"` and parsed into a tagged union once at the
//! boundary; nothing is mutated for an unverifiable or malformed delivery.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn, debug};
use crate::config::WebhookConfig;
use crate::database::DatabaseService;
use crate::models::video::{CreateVideoRequest, Video};
use crate::utils::errors::{SecondSaturdayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// The three transcoding events consumed from the provider
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum TranscodeEvent {
    /// The provider created an asset for a tracked upload
    #[serde(rename = "video.upload.asset_created")]
    AssetCreated { upload_id: String, asset_id: String },

    /// The asset finished processing and is playable
    #[serde(rename = "video.asset.ready")]
    AssetReady {
        asset_id: String,
        playback_id: String,
        duration: Option<f64>,
        aspect_ratio: Option<String>,
    },

    /// Processing failed
    #[serde(rename = "video.asset.errored")]
    AssetErrored { asset_id: String, error: Option<String> },
}

/// Video service for upload records and webhook events
#[derive(Clone)]
pub struct VideoService {
    db: DatabaseService,
    config: WebhookConfig,
}

impl VideoService {
    /// Create a new VideoService instance
    pub fn new(db: DatabaseService, config: WebhookConfig) -> Self {
        Self { db, config }
    }

    /// Track a new upload
    pub async fn create_upload(&self, request: CreateVideoRequest) -> Result<Video> {
        debug!(upload_id = %request.upload_id, user_id = request.user_id, "Tracking video upload");
        self.db.videos.create(request).await
    }

    /// Verify the webhook signature: hex HMAC-SHA256 of `"{timestamp}.{body}"`
    pub fn verify_signature(&self, timestamp: &str, body: &str, signature: &str, now: DateTime<Utc>) -> Result<()> {
        let timestamp_seconds: i64 = timestamp
            .parse()
            .map_err(|_| SecondSaturdayError::InvalidWebhookSignature)?;

        let age = (now.timestamp() - timestamp_seconds).abs();
        if age > self.config.tolerance_seconds {
            warn!(age_seconds = age, "Webhook timestamp outside tolerance");
            return Err(SecondSaturdayError::InvalidWebhookSignature);
        }

        let mut mac = HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|_| SecondSaturdayError::InvalidWebhookSignature)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        let expected = hex_encode(&mac.finalize().into_bytes());

        if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            Ok(())
        } else {
            Err(SecondSaturdayError::InvalidWebhookSignature)
        }
    }

    /// Verify, parse and apply one webhook delivery. Returns the affected
    /// video, or None when no tracked record matches the event.
    pub async fn handle_webhook(&self, timestamp: &str, body: &str, signature: &str, now: DateTime<Utc>) -> Result<Option<Video>> {
        self.verify_signature(timestamp, body, signature, now)?;

        let event: TranscodeEvent = serde_json::from_str(body)?;
        self.apply_event(event).await
    }

    /// Apply an already-verified transcoding event
    pub async fn apply_event(&self, event: TranscodeEvent) -> Result<Option<Video>> {
        match event {
            TranscodeEvent::AssetCreated { upload_id, asset_id } => {
                let video = self.db.videos.attach_asset(&upload_id, &asset_id).await?;
                if video.is_none() {
                    warn!(upload_id = %upload_id, "Video not found for upload");
                } else {
                    info!(upload_id = %upload_id, asset_id = %asset_id, "Asset attached to upload");
                }
                Ok(video)
            }
            TranscodeEvent::AssetReady { asset_id, playback_id, duration, aspect_ratio } => {
                let video = self
                    .db
                    .videos
                    .mark_ready(&asset_id, &playback_id, duration, aspect_ratio.as_deref())
                    .await?;
                if video.is_none() {
                    warn!(asset_id = %asset_id, "Video not found for asset");
                } else {
                    info!(asset_id = %asset_id, "Video ready");
                }
                Ok(video)
            }
            TranscodeEvent::AssetErrored { asset_id, error } => {
                let video = self.db.videos.mark_error(&asset_id, error.as_deref()).await?;
                if video.is_none() {
                    warn!(asset_id = %asset_id, "Video not found for asset");
                } else {
                    warn!(asset_id = %asset_id, "Video transcoding failed");
                }
                Ok(video)
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::video::{VIDEO_STATUS_PROCESSING, VIDEO_STATUS_READY, VIDEO_STATUS_ERROR};

    fn service() -> (VideoService, DatabaseService) {
        let db = DatabaseService::in_memory();
        let service = VideoService::new(
            db.clone(),
            WebhookConfig { signing_secret: "whsec-test".to_string(), tolerance_seconds: 300 },
        );
        (service, db)
    }

    fn sign(secret: &str, timestamp: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    async fn tracked_upload(db: &DatabaseService) -> Video {
        db.videos
            .create(CreateVideoRequest {
                upload_id: "up-1".to_string(),
                user_id: 1,
                circle_id: None,
                title: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_event_parsing_is_a_tagged_union() {
        let created: TranscodeEvent = serde_json::from_str(
            r#"{"type":"video.upload.asset_created","data":{"upload_id":"up-1","asset_id":"as-1"}}"#,
        )
        .unwrap();
        assert_eq!(
            created,
            TranscodeEvent::AssetCreated { upload_id: "up-1".to_string(), asset_id: "as-1".to_string() }
        );

        let malformed = serde_json::from_str::<TranscodeEvent>(r#"{"type":"video.asset.unknown","data":{}}"#);
        assert!(malformed.is_err());
    }

    #[tokio::test]
    async fn test_webhook_lifecycle() {
        let (service, db) = service();
        tracked_upload(&db).await;
        let timestamp = now().timestamp().to_string();

        let created = r#"{"type":"video.upload.asset_created","data":{"upload_id":"up-1","asset_id":"as-1"}}"#;
        let video = service
            .handle_webhook(&timestamp, created, &sign("whsec-test", &timestamp, created), now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(video.status, VIDEO_STATUS_PROCESSING);
        assert_eq!(video.asset_id.as_deref(), Some("as-1"));

        let ready = r#"{"type":"video.asset.ready","data":{"asset_id":"as-1","playback_id":"pb-1","duration":12.5,"aspect_ratio":"16:9"}}"#;
        let video = service
            .handle_webhook(&timestamp, ready, &sign("whsec-test", &timestamp, ready), now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(video.status, VIDEO_STATUS_READY);
        assert_eq!(video.playback_id.as_deref(), Some("pb-1"));
    }

    #[tokio::test]
    async fn test_errored_event_records_error() {
        let (service, db) = service();
        tracked_upload(&db).await;
        db.videos.attach_asset("up-1", "as-1").await.unwrap();

        let video = service
            .apply_event(TranscodeEvent::AssetErrored {
                asset_id: "as-1".to_string(),
                error: Some("input file corrupt".to_string()),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(video.status, VIDEO_STATUS_ERROR);
        assert_eq!(video.error.as_deref(), Some("input file corrupt"));
    }

    #[tokio::test]
    async fn test_bad_signature_mutates_nothing() {
        let (service, db) = service();
        tracked_upload(&db).await;
        let timestamp = now().timestamp().to_string();

        let created = r#"{"type":"video.upload.asset_created","data":{"upload_id":"up-1","asset_id":"as-1"}}"#;
        let result = service
            .handle_webhook(&timestamp, created, "deadbeef", now())
            .await;
        assert!(matches!(result, Err(SecondSaturdayError::InvalidWebhookSignature)));

        let video = db.videos.find_by_upload_id("up-1").await.unwrap().unwrap();
        assert!(video.asset_id.is_none());
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejected() {
        let (service, _) = service();
        let stale = (now().timestamp() - 3600).to_string();
        let body = r#"{"type":"video.upload.asset_created","data":{"upload_id":"up-1","asset_id":"as-1"}}"#;

        let result = service
            .handle_webhook(&stale, body, &sign("whsec-test", &stale, body), now())
            .await;
        assert!(matches!(result, Err(SecondSaturdayError::InvalidWebhookSignature)));
    }

    #[tokio::test]
    async fn test_unmatched_event_returns_none() {
        let (service, _) = service();

        let video = service
            .apply_event(TranscodeEvent::AssetReady {
                asset_id: "as-unknown".to_string(),
                playback_id: "pb-1".to_string(),
                duration: None,
                aspect_ratio: None,
            })
            .await
            .unwrap();
        assert!(video.is_none());
    }
}
