//! User service
//!
//! Sign-in synchronization, profile management and account deletion. An
//! account can only be deleted once the user no longer administers any
//! active circle; deletion then removes every trace of their content.

use tracing::{info, warn, debug};
use crate::database::DatabaseService;
use crate::models::user::{CreateUserRequest, UpdateUserRequest, User};
use crate::services::email::EmailService;
use crate::services::storage::StorageService;
use crate::utils::errors::{SecondSaturdayError, Result};

/// User service for profile and account operations
#[derive(Clone)]
pub struct UserService {
    db: DatabaseService,
    storage: StorageService,
    email: EmailService,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: DatabaseService, storage: StorageService, email: EmailService) -> Self {
        Self { db, storage, email }
    }

    /// Apply a sign-in event from the identity provider, creating or
    /// refreshing the user row for the subject
    pub async fn sync_sign_in(&self, request: CreateUserRequest) -> Result<User> {
        debug!(subject = %request.subject, "Syncing sign-in event");
        self.db.users.upsert_by_subject(request).await
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.db.users.find_by_id(user_id).await
    }

    /// Update profile fields; a replaced avatar's old object is deleted
    pub async fn update_profile(&self, user_id: i64, request: UpdateUserRequest) -> Result<User> {
        let existing = self
            .db
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SecondSaturdayError::UserNotFound { user_id })?;

        if request.avatar_storage_id.is_some() {
            if let Some(old_avatar) = &existing.avatar_storage_id {
                self.storage.delete_object(old_avatar).await;
            }
        }

        let user = self.db.users.update(user_id, request).await?;
        info!(user_id = user_id, "User profile updated");
        Ok(user)
    }

    /// Set the user's timezone
    pub async fn set_timezone(&self, user_id: i64, timezone: &str) -> Result<User> {
        self.db
            .users
            .update(
                user_id,
                UpdateUserRequest { timezone: Some(timezone.to_string()), ..Default::default() },
            )
            .await
    }

    /// Register the push provider player id for the user
    pub async fn register_push_player(&self, user_id: i64, player_id: &str) -> Result<()> {
        self.db.users.set_push_player_id(user_id, player_id).await
    }

    /// Delete the account. Refused while the user still administers an
    /// active circle; otherwise all memberships are marked left and every
    /// submission, response, media item and video of the user is destroyed.
    pub async fn delete_account(&self, user_id: i64) -> Result<()> {
        let user = self
            .db
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SecondSaturdayError::UserNotFound { user_id })?;

        let admined = self.db.circles.list_admined_by(user_id).await?;
        if !admined.is_empty() {
            warn!(user_id = user_id, circles = admined.len(), "Account deletion refused: admin obligations remain");
            return Err(SecondSaturdayError::AdminObligationsRemain);
        }

        self.db.memberships.mark_all_left_for_user(user_id).await?;

        let storage_ids = self.db.submissions.delete_all_for_user(user_id).await?;
        self.storage.delete_objects(&storage_ids).await;

        self.db.videos.delete_by_user(user_id).await?;

        if let Some(avatar) = &user.avatar_storage_id {
            self.storage.delete_object(avatar).await;
        }

        // Confirmation goes out after the state change; a failed send does
        // not resurrect the account
        let farewell = format!(
            "<p>Hi {},</p><p>Your Second Saturday account has been deleted.</p>",
            user.name.as_deref().unwrap_or("there")
        );
        if let Err(e) = self.email.send(&user.email, "Your account has been deleted", &farewell).await {
            warn!(user_id = user_id, error = %e, "Failed to send account deletion email");
        }

        self.db.users.delete(user_id).await?;
        info!(user_id = user_id, "Account deleted");
        Ok(())
    }
}
