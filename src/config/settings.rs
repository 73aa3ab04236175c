//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
    pub push: PushConfig,
    pub storage: StorageConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Shared secret used to verify session tokens
    pub jwt_secret: String,
    pub issuer: Option<String>,
}

/// Outbound email transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    /// Base URL used for view-in-app and unsubscribe links
    pub app_url: String,
    pub timeout_seconds: u64,
}

/// Push notification dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    pub api_url: String,
    pub app_id: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

/// Transcoding webhook configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Secret for HMAC-SHA256 signature verification
    pub signing_secret: String,
    /// Maximum accepted age of a webhook timestamp, in seconds
    pub tolerance_seconds: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SECONDSATURDAY"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SecondSaturdayError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/secondsaturday".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                issuer: None,
            },
            email: EmailConfig {
                api_url: "https://api.resend.com".to_string(),
                api_key: String::new(),
                from_address: "noreply@secondsaturday.app".to_string(),
                app_url: "https://secondsaturday.app".to_string(),
                timeout_seconds: 10,
            },
            push: PushConfig {
                api_url: "https://onesignal.com/api/v1".to_string(),
                app_id: String::new(),
                api_key: String::new(),
                timeout_seconds: 10,
            },
            storage: StorageConfig {
                api_url: "https://storage.secondsaturday.app".to_string(),
                api_key: String::new(),
                timeout_seconds: 10,
            },
            webhook: WebhookConfig {
                signing_secret: String::new(),
                tolerance_seconds: 300,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/secondsaturday".to_string(),
            },
        }
    }
}
