//! Data models
//!
//! This module contains all data structures used throughout the application

pub mod user;
pub mod circle;
pub mod membership;
pub mod submission;
pub mod newsletter;
pub mod video;

// Re-export commonly used models
pub use user::{User, CreateUserRequest, UpdateUserRequest};
pub use circle::{Circle, Prompt, CreateCircleRequest, UpdateCircleRequest, PromptInput};
pub use membership::Membership;
pub use submission::{Submission, SubmissionStatus, Response, Media, AddMediaRequest};
pub use newsletter::{
    Newsletter, CreateNewsletterRequest, NewsletterSection, SectionResponse, SectionMedia,
    AdminReminder, NotificationPreference,
};
pub use video::{Video, CreateVideoRequest};
