//! Database service layer
//!
//! This module provides a high-level interface to database operations.
//! Repositories are held behind their traits so the lifecycle services run
//! unchanged against PostgreSQL or the in-memory store.

use std::sync::Arc;

use crate::database::DatabasePool;
use crate::database::memory::{
    InMemoryCircleRepository, InMemoryMembershipRepository, InMemoryNewsletterRepository,
    InMemoryPreferenceRepository, InMemoryReminderRepository, InMemorySubmissionRepository,
    InMemoryUserRepository, InMemoryVideoRepository,
};
use crate::database::repositories::{
    CircleRepository, MembershipRepository, NewsletterRepository, PgCircleRepository,
    PgMembershipRepository, PgNewsletterRepository, PgPreferenceRepository, PgReminderRepository,
    PgSubmissionRepository, PgUserRepository, PgVideoRepository, PreferenceRepository,
    ReminderRepository, SubmissionRepository, UserRepository, VideoRepository,
};

#[derive(Clone)]
pub struct DatabaseService {
    pub users: Arc<dyn UserRepository>,
    pub circles: Arc<dyn CircleRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub newsletters: Arc<dyn NewsletterRepository>,
    pub reminders: Arc<dyn ReminderRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub videos: Arc<dyn VideoRepository>,
}

impl DatabaseService {
    /// Repositories backed by a PostgreSQL pool
    pub fn postgres(pool: DatabasePool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            circles: Arc::new(PgCircleRepository::new(pool.clone())),
            memberships: Arc::new(PgMembershipRepository::new(pool.clone())),
            submissions: Arc::new(PgSubmissionRepository::new(pool.clone())),
            newsletters: Arc::new(PgNewsletterRepository::new(pool.clone())),
            reminders: Arc::new(PgReminderRepository::new(pool.clone())),
            preferences: Arc::new(PgPreferenceRepository::new(pool.clone())),
            videos: Arc::new(PgVideoRepository::new(pool)),
        }
    }

    /// Repositories backed by process-local tables; used by tests
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            circles: Arc::new(InMemoryCircleRepository::new()),
            memberships: Arc::new(InMemoryMembershipRepository::new()),
            submissions: Arc::new(InMemorySubmissionRepository::new()),
            newsletters: Arc::new(InMemoryNewsletterRepository::new()),
            reminders: Arc::new(InMemoryReminderRepository::new()),
            preferences: Arc::new(InMemoryPreferenceRepository::new()),
            videos: Arc::new(InMemoryVideoRepository::new()),
        }
    }
}
