//! Database repositories module
//!
//! This module contains the persistence contracts and their PostgreSQL
//! implementations

pub mod user;
pub mod circle;
pub mod membership;
pub mod submission;
pub mod newsletter;
pub mod reminder;
pub mod video;

// Re-export repository traits and implementations
pub use user::{UserRepository, PgUserRepository};
pub use circle::{CircleRepository, PgCircleRepository};
pub use membership::{MembershipRepository, PgMembershipRepository};
pub use submission::{SubmissionRepository, PgSubmissionRepository};
pub use newsletter::{NewsletterRepository, PgNewsletterRepository};
pub use reminder::{ReminderRepository, PgReminderRepository, PreferenceRepository, PgPreferenceRepository};
pub use video::{VideoRepository, PgVideoRepository};
