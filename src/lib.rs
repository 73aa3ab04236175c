//! Second Saturday
//!
//! Cycle lifecycle engine for monthly friend-circle newsletters: deadline
//! computation, submission locking, membership lifecycle with redaction,
//! admin reminder gating and newsletter compilation, driven by weekly
//! scheduled sweeps.

#![allow(non_snake_case)]

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{SecondSaturdayError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
