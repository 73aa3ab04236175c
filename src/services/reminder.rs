//! Admin reminder gate and notification preferences
//!
//! Targeted and bulk admin reminders draw from one shared counter of at most
//! three records per (admin, circle, cycle). Bulk reminders notify the whole
//! non-submitter set while consuming a single record.

use std::collections::{HashMap, HashSet};
use tracing::{info, debug};
use crate::database::DatabaseService;
use crate::models::membership::Membership;
use crate::models::newsletter::MAX_ADMIN_REMINDERS;
use crate::models::submission::Submission;
use crate::services::push::{PushNotification, PushService};
use crate::utils::errors::{SecondSaturdayError, Result};

/// Resolved per-user notification opt-ins; defaults are all true
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPreferences {
    pub submission_reminders: bool,
    pub newsletter_ready: bool,
}

impl Default for ResolvedPreferences {
    fn default() -> Self {
        Self { submission_reminders: true, newsletter_ready: true }
    }
}

/// Active members with no completed submission for the cycle. A submission
/// without `submitted_at` is still a draft, so its author counts as a
/// non-submitter.
pub fn non_submitters<'a>(
    memberships: &'a [Membership],
    submissions: &[Submission],
    cycle_id: &str,
) -> Vec<&'a Membership> {
    let submitted: HashSet<i64> = submissions
        .iter()
        .filter(|s| s.cycle_id == cycle_id && s.submitted_at.is_some())
        .map(|s| s.user_id)
        .collect();

    memberships
        .iter()
        .filter(|m| m.is_active() && !m.blocked && !submitted.contains(&m.user_id))
        .collect()
}

/// Reminder service enforcing the admin reminder cap
#[derive(Clone)]
pub struct ReminderService {
    db: DatabaseService,
    push: PushService,
}

impl ReminderService {
    /// Create a new ReminderService instance
    pub fn new(db: DatabaseService, push: PushService) -> Self {
        Self { db, push }
    }

    async fn require_admin(&self, user_id: i64, circle_id: i64) -> Result<Membership> {
        match self.db.memberships.find_by_user_circle(user_id, circle_id).await? {
            Some(membership) if membership.is_active() && membership.is_admin() => Ok(membership),
            Some(membership) if membership.is_active() => Err(SecondSaturdayError::AdminRequired),
            _ => Err(SecondSaturdayError::NotAMember),
        }
    }

    async fn check_cap(&self, admin_id: i64, circle_id: i64, cycle_id: &str) -> Result<()> {
        let count = self.db.reminders.count_for(admin_id, circle_id, cycle_id).await?;
        if count >= MAX_ADMIN_REMINDERS {
            return Err(SecondSaturdayError::ReminderLimitReached);
        }
        Ok(())
    }

    /// Preferences for a user; an absent row means opted in to both kinds
    pub async fn resolve_preferences(&self, user_id: i64) -> Result<ResolvedPreferences> {
        let preferences = self.db.preferences.find_by_user(user_id).await?;
        Ok(preferences
            .map(|p| ResolvedPreferences {
                submission_reminders: p.submission_reminders,
                newsletter_ready: p.newsletter_ready,
            })
            .unwrap_or_default())
    }

    /// Create or overwrite the caller's preference row
    pub async fn update_preferences(&self, user_id: i64, submission_reminders: bool, newsletter_ready: bool) -> Result<ResolvedPreferences> {
        let row = self
            .db
            .preferences
            .upsert(user_id, submission_reminders, newsletter_ready)
            .await?;
        Ok(ResolvedPreferences {
            submission_reminders: row.submission_reminders,
            newsletter_ready: row.newsletter_ready,
        })
    }

    /// Reminder records already consumed for the (admin, circle, cycle)
    pub async fn reminder_count(&self, admin_id: i64, circle_id: i64, cycle_id: &str) -> Result<i64> {
        self.db.reminders.count_for(admin_id, circle_id, cycle_id).await
    }

    /// Remind one member; counts one record against the shared cap
    pub async fn send_admin_reminder(&self, admin_id: i64, circle_id: i64, target_id: i64, cycle_id: &str) -> Result<()> {
        debug!(admin_id = admin_id, circle_id = circle_id, target_id = target_id, cycle_id = %cycle_id, "Targeted admin reminder");

        self.require_admin(admin_id, circle_id).await?;

        let target = self.db.memberships.find_by_user_circle(target_id, circle_id).await?;
        match target {
            Some(membership) if membership.is_active() && !membership.blocked => {}
            _ => return Err(SecondSaturdayError::TargetNotActiveMember),
        }

        self.check_cap(admin_id, circle_id, cycle_id).await?;
        self.db.reminders.insert(circle_id, admin_id, Some(target_id), cycle_id).await?;

        let circle_name = self
            .db
            .circles
            .find_by_id(circle_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| "your circle".to_string());

        if self.resolve_preferences(target_id).await?.submission_reminders {
            if let Some(player_id) = self
                .db
                .users
                .find_by_id(target_id)
                .await?
                .and_then(|u| u.push_player_id)
            {
                self.push
                    .dispatch(PushNotification {
                        player_ids: vec![player_id],
                        title: "Submission Reminder".to_string(),
                        message: format!("Your admin in {circle_name} is reminding you to submit!"),
                        data: reminder_data(circle_id, cycle_id),
                    })
                    .await;
            }
        }

        info!(admin_id = admin_id, circle_id = circle_id, target_id = target_id, "Admin reminder sent");
        Ok(())
    }

    /// Remind every non-submitter at once; still one record against the cap
    pub async fn send_bulk_admin_reminder(&self, admin_id: i64, circle_id: i64, cycle_id: &str) -> Result<usize> {
        debug!(admin_id = admin_id, circle_id = circle_id, cycle_id = %cycle_id, "Bulk admin reminder");

        self.require_admin(admin_id, circle_id).await?;
        self.check_cap(admin_id, circle_id, cycle_id).await?;
        self.db.reminders.insert(circle_id, admin_id, None, cycle_id).await?;

        let memberships = self.db.memberships.list_by_circle(circle_id).await?;
        let submissions = self.db.submissions.list_by_circle_cycle(circle_id, cycle_id).await?;
        let pending = non_submitters(&memberships, &submissions, cycle_id);

        let mut player_ids = Vec::new();
        for membership in &pending {
            if !self.resolve_preferences(membership.user_id).await?.submission_reminders {
                continue;
            }
            if let Some(player_id) = self
                .db
                .users
                .find_by_id(membership.user_id)
                .await?
                .and_then(|u| u.push_player_id)
            {
                player_ids.push(player_id);
            }
        }

        let notified = player_ids.len();
        if notified > 0 {
            let circle_name = self
                .db
                .circles
                .find_by_id(circle_id)
                .await?
                .map(|c| c.name)
                .unwrap_or_else(|| "your circle".to_string());

            self.push
                .dispatch(PushNotification {
                    player_ids,
                    title: "Submission Reminder".to_string(),
                    message: format!("Your admin in {circle_name} is reminding you to submit!"),
                    data: reminder_data(circle_id, cycle_id),
                })
                .await;
        }

        info!(admin_id = admin_id, circle_id = circle_id, notified = notified, "Bulk admin reminder sent");
        Ok(notified)
    }
}

fn reminder_data(circle_id: i64, cycle_id: &str) -> HashMap<String, String> {
    HashMap::from([
        ("type".to_string(), "admin_reminder".to_string()),
        ("circle_id".to_string(), circle_id.to_string()),
        ("cycle_id".to_string(), cycle_id.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::config::PushConfig;
    use crate::models::circle::CreateCircleRequest;
    use crate::models::membership::{ROLE_ADMIN, ROLE_MEMBER};
    use crate::models::user::CreateUserRequest;

    fn membership(id: i64, user_id: i64, left: bool, blocked: bool) -> Membership {
        Membership {
            id,
            user_id,
            circle_id: 1,
            role: ROLE_MEMBER.to_string(),
            joined_at: Utc::now(),
            left_at: if left { Some(Utc::now()) } else { None },
            blocked,
        }
    }

    fn submission(user_id: i64, cycle_id: &str, submitted: bool) -> Submission {
        Submission {
            id: user_id * 100,
            user_id,
            circle_id: 1,
            cycle_id: cycle_id.to_string(),
            submitted_at: if submitted { Some(Utc::now()) } else { None },
            locked_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_non_submitters_excludes_completed_only() {
        let memberships = vec![
            membership(1, 10, false, false),
            membership(2, 11, false, false),
            membership(3, 12, false, false),
        ];
        // one completed, one still a draft
        let submissions = vec![
            submission(10, "2026-03", true),
            submission(11, "2026-03", false),
        ];

        let pending = non_submitters(&memberships, &submissions, "2026-03");
        let ids: Vec<i64> = pending.iter().map(|m| m.user_id).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_non_submitters_ignores_other_cycles_and_inactive_members() {
        let memberships = vec![
            membership(1, 10, false, false),
            membership(2, 11, true, false),
            membership(3, 12, true, true),
        ];
        let submissions = vec![submission(10, "2026-02", true)];

        let pending = non_submitters(&memberships, &submissions, "2026-03");
        let ids: Vec<i64> = pending.iter().map(|m| m.user_id).collect();
        assert_eq!(ids, vec![10]);
    }

    struct Fixture {
        service: ReminderService,
        db: DatabaseService,
        admin_id: i64,
        member_id: i64,
        circle_id: i64,
    }

    async fn setup() -> Fixture {
        let db = DatabaseService::in_memory();
        let push = PushService::new(PushConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            app_id: String::new(),
            api_key: String::new(),
            timeout_seconds: 1,
        })
        .unwrap();
        let service = ReminderService::new(db.clone(), push);

        let admin = db
            .users
            .create(CreateUserRequest {
                subject: "subj-admin".to_string(),
                email: "admin@example.com".to_string(),
                name: None,
                image_url: None,
            })
            .await
            .unwrap();
        let member = db
            .users
            .create(CreateUserRequest {
                subject: "subj-member".to_string(),
                email: "member@example.com".to_string(),
                name: None,
                image_url: None,
            })
            .await
            .unwrap();

        let circle = db
            .circles
            .create(CreateCircleRequest {
                name: "Weekend Crew".to_string(),
                description: None,
                timezone: "UTC".to_string(),
                admin_id: admin.id,
                invite_code: "invite-1".to_string(),
            })
            .await
            .unwrap();

        db.memberships.insert(admin.id, circle.id, ROLE_ADMIN).await.unwrap();
        db.memberships.insert(member.id, circle.id, ROLE_MEMBER).await.unwrap();

        Fixture { service, db, admin_id: admin.id, member_id: member.id, circle_id: circle.id }
    }

    #[tokio::test]
    async fn test_reminder_cap_across_targeted_and_bulk() {
        let f = setup().await;

        f.service
            .send_admin_reminder(f.admin_id, f.circle_id, f.member_id, "2026-03")
            .await
            .unwrap();
        f.service
            .send_bulk_admin_reminder(f.admin_id, f.circle_id, "2026-03")
            .await
            .unwrap();
        f.service
            .send_admin_reminder(f.admin_id, f.circle_id, f.member_id, "2026-03")
            .await
            .unwrap();

        // fourth call in any mix is rejected
        let fourth = f
            .service
            .send_bulk_admin_reminder(f.admin_id, f.circle_id, "2026-03")
            .await;
        assert!(matches!(fourth, Err(SecondSaturdayError::ReminderLimitReached)));

        let also_fourth = f
            .service
            .send_admin_reminder(f.admin_id, f.circle_id, f.member_id, "2026-03")
            .await;
        assert!(matches!(also_fourth, Err(SecondSaturdayError::ReminderLimitReached)));

        assert_eq!(
            f.service.reminder_count(f.admin_id, f.circle_id, "2026-03").await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_cap_is_per_cycle() {
        let f = setup().await;

        for _ in 0..3 {
            f.service
                .send_bulk_admin_reminder(f.admin_id, f.circle_id, "2026-03")
                .await
                .unwrap();
        }

        // a new cycle starts a new counter
        f.service
            .send_bulk_admin_reminder(f.admin_id, f.circle_id, "2026-04")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_member_cannot_send_reminders() {
        let f = setup().await;

        let result = f
            .service
            .send_admin_reminder(f.member_id, f.circle_id, f.admin_id, "2026-03")
            .await;
        assert!(matches!(result, Err(SecondSaturdayError::AdminRequired)));
    }

    #[tokio::test]
    async fn test_targeted_reminder_requires_active_target() {
        let f = setup().await;
        f.db.memberships
            .set_left_and_blocked(
                f.db.memberships
                    .find_by_user_circle(f.member_id, f.circle_id)
                    .await
                    .unwrap()
                    .unwrap()
                    .id,
            )
            .await
            .unwrap();

        let result = f
            .service
            .send_admin_reminder(f.admin_id, f.circle_id, f.member_id, "2026-03")
            .await;
        assert!(matches!(result, Err(SecondSaturdayError::TargetNotActiveMember)));

        // a rejected call consumes no cap
        assert_eq!(
            f.service.reminder_count(f.admin_id, f.circle_id, "2026-03").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_preferences_default_to_opted_in() {
        let f = setup().await;

        let resolved = f.service.resolve_preferences(f.member_id).await.unwrap();
        assert!(resolved.submission_reminders);
        assert!(resolved.newsletter_ready);

        let updated = f.service.update_preferences(f.member_id, false, true).await.unwrap();
        assert!(!updated.submission_reminders);
        assert!(updated.newsletter_ready);

        let resolved = f.service.resolve_preferences(f.member_id).await.unwrap();
        assert!(!resolved.submission_reminders);
    }
}
