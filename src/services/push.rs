//! Push notification dispatch service
//!
//! Sends `{player_ids, title, message, data}` batches to the push provider's
//! REST API. Delivery failures are logged and never retried here.

use std::collections::HashMap;
use std::time::Duration;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use crate::config::PushConfig;
use crate::utils::errors::{SecondSaturdayError, Result};

/// Push notification request structure
#[derive(Debug, Clone, Serialize)]
pub struct PushNotification {
    pub player_ids: Vec<String>,
    pub title: String,
    pub message: String,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ProviderPayload<'a> {
    app_id: &'a str,
    include_player_ids: &'a [String],
    headings: HashMap<&'static str, &'a str>,
    contents: HashMap<&'static str, &'a str>,
    data: &'a HashMap<String, String>,
}

/// Push dispatch client
#[derive(Debug, Clone)]
pub struct PushService {
    client: Client,
    config: PushConfig,
}

impl PushService {
    /// Create a new PushService instance
    pub fn new(config: PushConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("SecondSaturday/1.0")
            .build()
            .map_err(SecondSaturdayError::Http)?;

        Ok(Self { client, config })
    }

    /// Dispatch a push notification batch. Skips silently when the provider
    /// is not configured; logs and swallows delivery failures.
    pub async fn dispatch(&self, notification: PushNotification) {
        if self.config.app_id.is_empty() || self.config.api_key.is_empty() {
            warn!("Push provider not configured, skipping push notification");
            return;
        }
        if notification.player_ids.is_empty() {
            return;
        }

        let payload = ProviderPayload {
            app_id: &self.config.app_id,
            include_player_ids: &notification.player_ids,
            headings: HashMap::from([("en", notification.title.as_str())]),
            contents: HashMap::from([("en", notification.message.as_str())]),
            data: &notification.data,
        };

        let url = format!("{}/notifications", self.config.api_url);
        let result = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", self.config.api_key))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(
                    recipient_count = notification.player_ids.len(),
                    title = %notification.title,
                    "Push notification dispatched"
                );
            }
            Ok(response) => {
                warn!(status = %response.status(), "Push provider rejected notification");
            }
            Err(e) => {
                warn!(error = %e, "Failed to dispatch push notification");
            }
        }
    }
}
