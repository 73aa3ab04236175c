//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the Second Saturday application.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "secondsaturday.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(())
}

/// Log membership lifecycle events with structured data
pub fn log_membership_event(circle_id: i64, user_id: i64, event: &str, details: Option<&str>) {
    info!(
        circle_id = circle_id,
        user_id = user_id,
        event = event,
        details = details,
        "Membership event occurred"
    );
}

/// Log admin actions against another member
pub fn log_admin_action(admin_id: i64, circle_id: i64, action: &str, target: Option<i64>) {
    warn!(
        admin_id = admin_id,
        circle_id = circle_id,
        action = action,
        target = target,
        "Admin action performed"
    );
}

/// Log a sweep unit outcome
pub fn log_sweep_unit(sweep: &str, circle_id: i64, success: bool, details: Option<&str>) {
    if success {
        info!(
            sweep = sweep,
            circle_id = circle_id,
            details = details,
            "Sweep unit completed"
        );
    } else {
        warn!(
            sweep = sweep,
            circle_id = circle_id,
            details = details,
            "Sweep unit failed"
        );
    }
}
