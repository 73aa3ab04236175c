//! Circle service
//!
//! Circle creation with the default prompt set, settings updates, invite
//! code rotation, archiving, and prompt management.

use tracing::{info, debug};
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::circle::{
    Circle, CreateCircleRequest, Prompt, PromptInput, UpdateCircleRequest,
    DEFAULT_PROMPTS, MAX_PROMPTS, MAX_PROMPT_LENGTH,
};
use crate::models::membership::{Membership, ROLE_ADMIN};
use crate::utils::errors::{SecondSaturdayError, Result};

/// Circle service for circle and prompt administration
#[derive(Clone)]
pub struct CircleService {
    db: DatabaseService,
}

impl CircleService {
    /// Create a new CircleService instance
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    fn validate_name(name: &str) -> Result<()> {
        let length = name.chars().count();
        if !(3..=50).contains(&length) {
            return Err(SecondSaturdayError::InvalidInput(
                "Circle name must be 3-50 characters".to_string(),
            ));
        }
        Ok(())
    }

    async fn require_membership(&self, user_id: i64, circle_id: i64) -> Result<Membership> {
        match self.db.memberships.find_by_user_circle(user_id, circle_id).await? {
            Some(membership) if membership.is_active() => Ok(membership),
            _ => Err(SecondSaturdayError::NotAMember),
        }
    }

    async fn require_admin(&self, user_id: i64, circle_id: i64) -> Result<Membership> {
        let membership = self.require_membership(user_id, circle_id).await?;
        if !membership.is_admin() {
            return Err(SecondSaturdayError::AdminRequired);
        }
        Ok(membership)
    }

    /// Create a circle with its founder as admin and the default prompts
    pub async fn create_circle(&self, admin_user_id: i64, name: &str, description: Option<String>, timezone: &str) -> Result<Circle> {
        Self::validate_name(name)?;

        let circle = self
            .db
            .circles
            .create(CreateCircleRequest {
                name: name.to_string(),
                description,
                timezone: timezone.to_string(),
                admin_id: admin_user_id,
                invite_code: Uuid::new_v4().to_string(),
            })
            .await?;

        self.db.memberships.insert(admin_user_id, circle.id, ROLE_ADMIN).await?;

        for (position, text) in DEFAULT_PROMPTS.iter().enumerate() {
            self.db.circles.insert_prompt(circle.id, text, position as i32).await?;
        }

        info!(circle_id = circle.id, admin_id = admin_user_id, "Circle created");
        Ok(circle)
    }

    /// Update circle name/description; admin only
    pub async fn update_circle(&self, caller_id: i64, circle_id: i64, request: UpdateCircleRequest) -> Result<Circle> {
        self.require_admin(caller_id, circle_id).await?;

        if let Some(name) = &request.name {
            Self::validate_name(name)?;
        }

        self.db.circles.update(circle_id, request).await
    }

    /// Rotate the invite code; every previously distributed link dies now
    pub async fn rotate_invite_code(&self, caller_id: i64, circle_id: i64) -> Result<String> {
        self.require_admin(caller_id, circle_id).await?;

        let code = Uuid::new_v4().to_string();
        self.db.circles.set_invite_code(circle_id, &code).await?;

        info!(circle_id = circle_id, "Invite code rotated");
        Ok(code)
    }

    /// Archive the circle; terminal for invite acceptance
    pub async fn archive_circle(&self, caller_id: i64, circle_id: i64) -> Result<()> {
        self.require_admin(caller_id, circle_id).await?;
        self.db.circles.archive(circle_id).await?;

        info!(circle_id = circle_id, "Circle archived");
        Ok(())
    }

    /// Circle details for a member
    pub async fn get_circle(&self, caller_id: i64, circle_id: i64) -> Result<Circle> {
        self.require_membership(caller_id, circle_id).await?;
        self.db
            .circles
            .find_by_id(circle_id)
            .await?
            .ok_or(SecondSaturdayError::CircleNotFound { circle_id })
    }

    /// Active prompts for a member, in display order
    pub async fn get_prompts(&self, caller_id: i64, circle_id: i64) -> Result<Vec<Prompt>> {
        self.require_membership(caller_id, circle_id).await?;
        self.db.circles.list_active_prompts(circle_id).await
    }

    /// Replace the active prompt set; admin only, 1-8 prompts of up to
    /// 200 characters each
    pub async fn replace_prompts(&self, caller_id: i64, circle_id: i64, prompts: Vec<PromptInput>) -> Result<()> {
        self.require_admin(caller_id, circle_id).await?;

        if prompts.is_empty() || prompts.len() > MAX_PROMPTS {
            return Err(SecondSaturdayError::InvalidInput(
                "Must have 1-8 prompts".to_string(),
            ));
        }
        for prompt in &prompts {
            if prompt.text.chars().count() > MAX_PROMPT_LENGTH {
                return Err(SecondSaturdayError::InvalidInput(
                    "Prompt text must be 200 characters or less".to_string(),
                ));
            }
        }

        debug!(circle_id = circle_id, count = prompts.len(), "Replacing prompt set");
        self.db.circles.replace_prompts(circle_id, prompts).await
    }
}
