//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{SecondSaturdayError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_auth_config(&settings.auth)?;
    validate_email_config(&settings.email)?;
    validate_push_config(&settings.push)?;
    validate_storage_config(&settings.storage)?;
    validate_webhook_config(&settings.webhook)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(SecondSaturdayError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(SecondSaturdayError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate identity provider configuration
fn validate_auth_config(config: &super::AuthConfig) -> Result<()> {
    if config.jwt_secret.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Auth JWT secret is required".to_string()
        ));
    }

    Ok(())
}

/// Validate email transport configuration
fn validate_email_config(config: &super::EmailConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Email API URL is required".to_string()
        ));
    }

    if config.from_address.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Email from address is required".to_string()
        ));
    }

    if url::Url::parse(&config.app_url).is_err() {
        return Err(SecondSaturdayError::Config(
            format!("Invalid app URL: {}", config.app_url)
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(SecondSaturdayError::Config(
            "Email timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate push dispatch configuration
fn validate_push_config(config: &super::PushConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Push API URL is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(SecondSaturdayError::Config(
            "Push timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate object storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Storage API URL is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(SecondSaturdayError::Config(
            "Storage timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate webhook configuration
fn validate_webhook_config(config: &super::WebhookConfig) -> Result<()> {
    if config.signing_secret.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Webhook signing secret is required".to_string()
        ));
    }

    if config.tolerance_seconds <= 0 {
        return Err(SecondSaturdayError::Config(
            "Webhook tolerance must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(SecondSaturdayError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(SecondSaturdayError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.auth.jwt_secret = "secret".to_string();
        settings.webhook.signing_secret = "whsec".to_string();
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_jwt_secret_rejected() {
        let mut settings = valid_settings();
        settings.auth.jwt_secret = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut settings = valid_settings();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_connection_bounds_rejected() {
        let mut settings = valid_settings();
        settings.database.min_connections = 20;
        assert!(validate_settings(&settings).is_err());
    }
}
