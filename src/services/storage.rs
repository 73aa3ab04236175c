//! Object storage service
//!
//! Thin client over the storage provider's HTTP API. Deletions are issued by
//! the redaction and account-deletion cascades after their database
//! transactions commit; a failed delete is logged and never escalated into
//! the owning operation.

use std::time::Duration;
use reqwest::Client;
use tracing::{debug, warn};
use crate::config::StorageConfig;
use crate::utils::errors::{SecondSaturdayError, Result};

/// Object storage client
#[derive(Debug, Clone)]
pub struct StorageService {
    client: Client,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new StorageService instance
    pub fn new(config: StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("SecondSaturday/1.0")
            .build()
            .map_err(SecondSaturdayError::Http)?;

        Ok(Self { client, config })
    }

    /// Public URL for a stored object
    pub fn public_url(&self, storage_id: &str) -> String {
        format!("{}/objects/{}", self.config.api_url, storage_id)
    }

    /// Delete one stored object; failure is logged, not returned
    pub async fn delete_object(&self, storage_id: &str) {
        let url = format!("{}/objects/{}", self.config.api_url, storage_id);

        let result = self
            .client
            .delete(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(storage_id = %storage_id, "Storage object deleted");
            }
            Ok(response) => {
                warn!(storage_id = %storage_id, status = %response.status(), "Storage delete rejected");
            }
            Err(e) => {
                warn!(storage_id = %storage_id, error = %e, "Storage delete failed");
            }
        }
    }

    /// Delete a batch of stored objects, continuing past failures
    pub async fn delete_objects(&self, storage_ids: &[String]) {
        for storage_id in storage_ids {
            self.delete_object(storage_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        let service = StorageService::new(StorageConfig {
            api_url: "https://storage.example.com".to_string(),
            api_key: "key".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();

        assert_eq!(
            service.public_url("obj-123"),
            "https://storage.example.com/objects/obj-123"
        );
    }
}
