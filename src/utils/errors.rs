//! Error handling for Second Saturday
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for the Second Saturday application
#[derive(Error, Debug)]
pub enum SecondSaturdayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("User not found")]
    SubjectNotRegistered,

    #[error("Circle not found: {circle_id}")]
    CircleNotFound { circle_id: i64 },

    #[error("Submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: i64 },

    #[error("Prompt not found: {prompt_id}")]
    PromptNotFound { prompt_id: i64 },

    #[error("Response not found: {response_id}")]
    ResponseNotFound { response_id: i64 },

    #[error("Media not found: {media_id}")]
    MediaNotFound { media_id: i64 },

    #[error("Video not found: {reference}")]
    VideoNotFound { reference: String },

    #[error("Not a member of this circle")]
    NotAMember,

    #[error("Admin access required")]
    AdminRequired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid invite code")]
    InvalidInviteCode,

    #[error("This circle has been archived")]
    CircleArchived,

    #[error("You have been blocked from this circle")]
    MemberBlocked,

    #[error("Transfer admin role before leaving")]
    AdminCannotLeave,

    #[error("Cannot remove yourself. Use leave circle instead.")]
    CannotRemoveSelf,

    #[error("Cannot transfer the admin role to yourself")]
    CannotTransferToSelf,

    #[error("Target user is not an active member of this circle")]
    TargetNotActiveMember,

    #[error("You must transfer or archive your circles before deleting your account")]
    AdminObligationsRemain,

    #[error("Invalid cycle ID: {0}")]
    InvalidCycleId(String),

    #[error("Only one submission per user per circle per cycle allowed")]
    SubmissionAlreadyExists,

    #[error("Cannot modify locked submission")]
    SubmissionLocked,

    #[error("Submission is already locked")]
    SubmissionAlreadyLocked,

    #[error("Response can have up to 3 media items")]
    MediaLimitReached,

    #[error("Maximum of 3 admin reminders per cycle reached")]
    ReminderLimitReached,

    #[error("Newsletter already compiled for circle {circle_id}, cycle {cycle_id}")]
    NewsletterAlreadyCompiled { circle_id: i64, cycle_id: String },

    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for Second Saturday operations
pub type Result<T> = std::result::Result<T, SecondSaturdayError>;

impl SecondSaturdayError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SecondSaturdayError::Database(_) => false,
            SecondSaturdayError::Migration(_) => false,
            SecondSaturdayError::Config(_) => false,
            SecondSaturdayError::Http(_) => true,
            SecondSaturdayError::Io(_) => true,
            SecondSaturdayError::ServiceUnavailable(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SecondSaturdayError::Database(_) => ErrorSeverity::Critical,
            SecondSaturdayError::Migration(_) => ErrorSeverity::Critical,
            SecondSaturdayError::Config(_) => ErrorSeverity::Critical,
            SecondSaturdayError::NotAuthenticated => ErrorSeverity::Warning,
            SecondSaturdayError::PermissionDenied(_) => ErrorSeverity::Warning,
            SecondSaturdayError::AdminRequired => ErrorSeverity::Warning,
            SecondSaturdayError::InvalidWebhookSignature => ErrorSeverity::Warning,
            SecondSaturdayError::ReminderLimitReached => ErrorSeverity::Warning,
            SecondSaturdayError::InvalidInput(_) => ErrorSeverity::Info,
            SecondSaturdayError::InvalidCycleId(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
