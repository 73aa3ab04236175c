//! Membership lifecycle service
//!
//! Join, leave, removal, blocking and admin transfer. Blocking cascades over
//! the member's past contributions: response texts are overwritten with the
//! redaction marker and their media is deleted, database rows first and
//! stored objects after the rows are gone.

use tracing::{info, debug};
use crate::database::DatabaseService;
use crate::models::membership::{Membership, ROLE_ADMIN, ROLE_MEMBER};
use crate::models::submission::REDACTION_MARKER;
use crate::services::storage::StorageService;
use crate::utils::errors::{SecondSaturdayError, Result};
use crate::utils::logging;

/// Outcome of a join attempt
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub circle_id: i64,
    pub already_member: bool,
}

/// Membership service for circle member lifecycle operations
#[derive(Clone)]
pub struct MembershipService {
    db: DatabaseService,
    storage: StorageService,
}

impl MembershipService {
    /// Create a new MembershipService instance
    pub fn new(db: DatabaseService, storage: StorageService) -> Self {
        Self { db, storage }
    }

    /// Require an active membership for the user in the circle
    async fn require_membership(&self, user_id: i64, circle_id: i64) -> Result<Membership> {
        match self.db.memberships.find_by_user_circle(user_id, circle_id).await? {
            Some(membership) if membership.is_active() => Ok(membership),
            _ => Err(SecondSaturdayError::NotAMember),
        }
    }

    /// Require an active admin membership for the user in the circle
    async fn require_admin(&self, user_id: i64, circle_id: i64) -> Result<Membership> {
        let membership = self.require_membership(user_id, circle_id).await?;
        if !membership.is_admin() {
            return Err(SecondSaturdayError::AdminRequired);
        }
        Ok(membership)
    }

    /// Join a circle by invite code. A historical non-blocked membership is
    /// reactivated so prior contributions stay attached; a blocked one
    /// rejects the rejoin.
    pub async fn join(&self, user_id: i64, invite_code: &str) -> Result<JoinOutcome> {
        debug!(user_id = user_id, "Join attempt by invite code");

        let circle = self
            .db
            .circles
            .find_by_invite_code(invite_code)
            .await?
            .ok_or(SecondSaturdayError::InvalidInviteCode)?;

        if circle.is_archived() {
            return Err(SecondSaturdayError::CircleArchived);
        }

        match self.db.memberships.find_by_user_circle(user_id, circle.id).await? {
            Some(membership) if membership.blocked => Err(SecondSaturdayError::MemberBlocked),
            Some(membership) if membership.is_active() => {
                debug!(user_id = user_id, circle_id = circle.id, "Already an active member");
                Ok(JoinOutcome { circle_id: circle.id, already_member: true })
            }
            Some(membership) => {
                self.db.memberships.reactivate(membership.id).await?;
                logging::log_membership_event(circle.id, user_id, "rejoined", None);
                Ok(JoinOutcome { circle_id: circle.id, already_member: false })
            }
            None => {
                self.db.memberships.insert(user_id, circle.id, ROLE_MEMBER).await?;
                logging::log_membership_event(circle.id, user_id, "joined", None);
                Ok(JoinOutcome { circle_id: circle.id, already_member: false })
            }
        }
    }

    /// Leave a circle. Admins must transfer the role first.
    pub async fn leave(&self, user_id: i64, circle_id: i64) -> Result<()> {
        let membership = self.require_membership(user_id, circle_id).await?;

        if membership.is_admin() {
            return Err(SecondSaturdayError::AdminCannotLeave);
        }

        self.db.memberships.set_left(membership.id).await?;
        logging::log_membership_event(circle_id, user_id, "left", None);
        Ok(())
    }

    /// Hand the admin role to another active member and repoint the circle
    pub async fn transfer_admin(&self, caller_id: i64, circle_id: i64, new_admin_id: i64) -> Result<()> {
        let caller = self.require_admin(caller_id, circle_id).await?;

        if new_admin_id == caller_id {
            return Err(SecondSaturdayError::CannotTransferToSelf);
        }

        let target = match self.db.memberships.find_by_user_circle(new_admin_id, circle_id).await? {
            Some(membership) if membership.is_active() && !membership.blocked => membership,
            _ => return Err(SecondSaturdayError::TargetNotActiveMember),
        };

        self.db.memberships.set_role(target.id, ROLE_ADMIN).await?;
        self.db.memberships.set_role(caller.id, ROLE_MEMBER).await?;
        self.db.circles.set_admin(circle_id, new_admin_id).await?;

        logging::log_admin_action(caller_id, circle_id, "transfer_admin", Some(new_admin_id));
        Ok(())
    }

    /// Remove a member. With `keep_contributions` their history stays intact
    /// and they may rejoin; without it they are blocked and every past
    /// response is redacted and its media destroyed.
    pub async fn remove_member(&self, caller_id: i64, circle_id: i64, target_id: i64, keep_contributions: bool) -> Result<()> {
        self.require_admin(caller_id, circle_id).await?;

        if target_id == caller_id {
            return Err(SecondSaturdayError::CannotRemoveSelf);
        }

        let target = match self.db.memberships.find_by_user_circle(target_id, circle_id).await? {
            Some(membership) if membership.is_active() => membership,
            _ => return Err(SecondSaturdayError::TargetNotActiveMember),
        };

        if keep_contributions {
            self.db.memberships.set_left(target.id).await?;
            logging::log_admin_action(caller_id, circle_id, "remove_member", Some(target_id));
            return Ok(());
        }

        self.db.memberships.set_left_and_blocked(target.id).await?;

        let storage_ids = self
            .db
            .submissions
            .redact_member_content(target_id, circle_id, REDACTION_MARKER)
            .await?;

        info!(
            circle_id = circle_id,
            target_id = target_id,
            deleted_media = storage_ids.len(),
            "Redaction cascade applied"
        );

        // Stored objects go after the rows are gone; failures stay external
        self.storage.delete_objects(&storage_ids).await;

        logging::log_admin_action(caller_id, circle_id, "remove_and_block", Some(target_id));
        Ok(())
    }

    /// Active, non-blocked members of a circle
    pub async fn active_members(&self, circle_id: i64) -> Result<Vec<Membership>> {
        let memberships = self.db.memberships.list_by_circle(circle_id).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| m.is_active() && !m.blocked)
            .collect())
    }

    /// Membership row for a (user, circle), if any
    pub async fn membership_for(&self, user_id: i64, circle_id: i64) -> Result<Option<Membership>> {
        self.db.memberships.find_by_user_circle(user_id, circle_id).await
    }
}
