//! Services module
//!
//! This module contains business logic services

pub mod auth;
pub mod circle;
pub mod cycle;
pub mod email;
pub mod membership;
pub mod newsletter;
pub mod push;
pub mod reminder;
pub mod storage;
pub mod submission;
pub mod sweep;
pub mod user;
pub mod video;

// Re-export commonly used services
pub use auth::{AuthService, IdentityClaims};
pub use circle::CircleService;
pub use email::{EmailService, Recipient};
pub use membership::{MembershipService, JoinOutcome};
pub use newsletter::{NewsletterService, CompileOutcome};
pub use push::{PushService, PushNotification};
pub use reminder::{ReminderService, ResolvedPreferences};
pub use storage::StorageService;
pub use submission::SubmissionService;
pub use sweep::{SweepService, SweepReport};
pub use user::UserService;
pub use video::{VideoService, TranscodeEvent};

use crate::config::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub circle_service: CircleService,
    pub membership_service: MembershipService,
    pub submission_service: SubmissionService,
    pub reminder_service: ReminderService,
    pub newsletter_service: NewsletterService,
    pub video_service: VideoService,
    pub sweep_service: SweepService,
    pub email_service: EmailService,
    pub push_service: PushService,
    pub storage_service: StorageService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(db: DatabaseService, settings: Settings) -> Result<Self> {
        let storage_service = StorageService::new(settings.storage.clone())?;
        let email_service = EmailService::new(settings.email.clone())?;
        let push_service = PushService::new(settings.push.clone())?;

        let auth_service = AuthService::new(db.clone(), settings.auth.clone());
        let user_service = UserService::new(db.clone(), storage_service.clone(), email_service.clone());
        let circle_service = CircleService::new(db.clone());
        let membership_service = MembershipService::new(db.clone(), storage_service.clone());
        let submission_service = SubmissionService::new(db.clone());
        let reminder_service = ReminderService::new(db.clone(), push_service.clone());
        let newsletter_service = NewsletterService::new(db.clone(), storage_service.clone());
        let video_service = VideoService::new(db.clone(), settings.webhook.clone());
        let sweep_service = SweepService::new(
            db,
            submission_service.clone(),
            newsletter_service.clone(),
            reminder_service.clone(),
            email_service.clone(),
            push_service.clone(),
        );

        Ok(Self {
            auth_service,
            user_service,
            circle_service,
            membership_service,
            submission_service,
            reminder_service,
            newsletter_service,
            video_service,
            sweep_service,
            email_service,
            push_service,
            storage_service,
        })
    }
}
