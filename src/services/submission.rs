//! Submission lifecycle service
//!
//! Drives the per-(user, circle, cycle) state machine: no row, in-progress
//! draft, locked submission. Locking is a one-way latch; once `locked_at` is
//! set every further write is rejected.

use chrono::{DateTime, Utc};
use tracing::{info, warn, debug};
use crate::database::DatabaseService;
use crate::models::membership::Membership;
use crate::models::submission::{
    AddMediaRequest, Media, Response, Submission, SubmissionStatus,
    MAX_MEDIA_PER_RESPONSE, MAX_RESPONSE_LENGTH, MEDIA_KIND_IMAGE, MEDIA_KIND_VIDEO,
};
use crate::services::cycle;
use crate::utils::errors::{SecondSaturdayError, Result};

/// Submission service for draft, response and media operations
#[derive(Clone)]
pub struct SubmissionService {
    db: DatabaseService,
}

impl SubmissionService {
    /// Create a new SubmissionService instance
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Require an active membership for the user in the circle
    async fn require_membership(&self, user_id: i64, circle_id: i64) -> Result<Membership> {
        match self.db.memberships.find_by_user_circle(user_id, circle_id).await? {
            Some(membership) if membership.is_active() => Ok(membership),
            _ => Err(SecondSaturdayError::NotAMember),
        }
    }

    fn validate_text(text: &str) -> Result<()> {
        if text.chars().count() > MAX_RESPONSE_LENGTH {
            return Err(SecondSaturdayError::InvalidInput(
                "Response text must be 500 characters or less".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a submission for the triple; at most one may exist
    pub async fn create_submission(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Submission> {
        debug!(user_id = user_id, circle_id = circle_id, cycle_id = %cycle_id, "Creating submission");

        self.require_membership(user_id, circle_id).await?;
        cycle::parse_cycle_id(cycle_id)?;

        if self
            .db
            .submissions
            .find_by_user_circle_cycle(user_id, circle_id, cycle_id)
            .await?
            .is_some()
        {
            return Err(SecondSaturdayError::SubmissionAlreadyExists);
        }

        let submission = self.db.submissions.create(user_id, circle_id, cycle_id).await?;
        info!(user_id = user_id, circle_id = circle_id, cycle_id = %cycle_id, submission_id = submission.id, "Submission created");

        Ok(submission)
    }

    /// Create or overwrite the caller's response to a prompt
    pub async fn upsert_response(&self, user_id: i64, submission_id: i64, prompt_id: i64, text: &str) -> Result<Response> {
        debug!(user_id = user_id, submission_id = submission_id, prompt_id = prompt_id, "Upserting response");

        Self::validate_text(text)?;

        let submission = self
            .db
            .submissions
            .find_by_id(submission_id)
            .await?
            .ok_or(SecondSaturdayError::SubmissionNotFound { submission_id })?;

        if submission.user_id != user_id {
            return Err(SecondSaturdayError::PermissionDenied(
                "Not authorized to modify this submission".to_string(),
            ));
        }
        if submission.is_locked() {
            return Err(SecondSaturdayError::SubmissionLocked);
        }

        let prompt = self
            .db
            .circles
            .find_prompt(prompt_id)
            .await?
            .ok_or(SecondSaturdayError::PromptNotFound { prompt_id })?;
        if prompt.circle_id != submission.circle_id {
            return Err(SecondSaturdayError::InvalidInput(
                "Prompt does not belong to this circle".to_string(),
            ));
        }

        self.db.submissions.upsert_response(submission_id, prompt_id, text).await
    }

    /// Autosave entry point: create the submission if absent, then write the
    /// response. One effective operation from the caller's perspective.
    pub async fn save_draft(&self, user_id: i64, circle_id: i64, cycle_id: &str, prompt_id: i64, text: &str) -> Result<Response> {
        debug!(user_id = user_id, circle_id = circle_id, cycle_id = %cycle_id, prompt_id = prompt_id, "Saving draft");

        self.require_membership(user_id, circle_id).await?;
        cycle::parse_cycle_id(cycle_id)?;
        Self::validate_text(text)?;

        let submission = match self
            .db
            .submissions
            .find_by_user_circle_cycle(user_id, circle_id, cycle_id)
            .await?
        {
            Some(existing) => existing,
            None => match self.db.submissions.create(user_id, circle_id, cycle_id).await {
                Ok(created) => created,
                // Lost a create race with another autosave call; use theirs
                Err(SecondSaturdayError::SubmissionAlreadyExists) => self
                    .db
                    .submissions
                    .find_by_user_circle_cycle(user_id, circle_id, cycle_id)
                    .await?
                    .ok_or(SecondSaturdayError::SubmissionAlreadyExists)?,
                Err(e) => return Err(e),
            },
        };

        self.upsert_response(user_id, submission.id, prompt_id, text).await
    }

    /// Lock a submission explicitly; stamps `submitted_at`
    pub async fn lock_submission(&self, user_id: i64, submission_id: i64) -> Result<Submission> {
        let submission = self
            .db
            .submissions
            .find_by_id(submission_id)
            .await?
            .ok_or(SecondSaturdayError::SubmissionNotFound { submission_id })?;

        if submission.user_id != user_id {
            return Err(SecondSaturdayError::PermissionDenied(
                "Not authorized to lock this submission".to_string(),
            ));
        }
        if submission.is_locked() {
            return Err(SecondSaturdayError::SubmissionAlreadyLocked);
        }

        let now = Utc::now();
        self.db.submissions.lock(submission_id, now, true).await?;
        info!(user_id = user_id, submission_id = submission_id, "Submission locked by user");

        self.db
            .submissions
            .find_by_id(submission_id)
            .await?
            .ok_or(SecondSaturdayError::SubmissionNotFound { submission_id })
    }

    /// Attach a media item to a response, capped at 3 per response
    pub async fn add_media(&self, user_id: i64, request: AddMediaRequest) -> Result<Media> {
        if request.kind != MEDIA_KIND_IMAGE && request.kind != MEDIA_KIND_VIDEO {
            return Err(SecondSaturdayError::InvalidInput(format!(
                "Unknown media kind: {}",
                request.kind
            )));
        }

        let response = self
            .db
            .submissions
            .find_response_by_id(request.response_id)
            .await?
            .ok_or(SecondSaturdayError::ResponseNotFound { response_id: request.response_id })?;

        let submission = self
            .db
            .submissions
            .find_by_id(response.submission_id)
            .await?
            .ok_or(SecondSaturdayError::SubmissionNotFound { submission_id: response.submission_id })?;

        if submission.user_id != user_id {
            return Err(SecondSaturdayError::PermissionDenied(
                "Not authorized to modify this response".to_string(),
            ));
        }
        if submission.is_locked() {
            return Err(SecondSaturdayError::SubmissionLocked);
        }

        let existing = self.db.submissions.list_media(response.id).await?;
        if existing.len() >= MAX_MEDIA_PER_RESPONSE {
            return Err(SecondSaturdayError::MediaLimitReached);
        }

        self.db.submissions.add_media(request, existing.len() as i32).await
    }

    /// Remove a media item; remaining items are re-packed to stay contiguous
    pub async fn remove_media(&self, user_id: i64, media_id: i64) -> Result<()> {
        let media = self
            .db
            .submissions
            .find_media(media_id)
            .await?
            .ok_or(SecondSaturdayError::MediaNotFound { media_id })?;

        let response = self
            .db
            .submissions
            .find_response_by_id(media.response_id)
            .await?
            .ok_or(SecondSaturdayError::ResponseNotFound { response_id: media.response_id })?;

        let submission = self
            .db
            .submissions
            .find_by_id(response.submission_id)
            .await?
            .ok_or(SecondSaturdayError::SubmissionNotFound { submission_id: response.submission_id })?;

        if submission.user_id != user_id {
            return Err(SecondSaturdayError::PermissionDenied(
                "Not authorized to remove this media".to_string(),
            ));
        }
        if submission.is_locked() {
            return Err(SecondSaturdayError::SubmissionLocked);
        }

        self.db.submissions.remove_media(media_id).await
    }

    /// Lifecycle state for the triple; `NotStarted` when no row exists
    pub async fn submission_status(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<SubmissionStatus> {
        let submission = self
            .db
            .submissions
            .find_by_user_circle_cycle(user_id, circle_id, cycle_id)
            .await?;

        Ok(submission.map(|s| s.status()).unwrap_or(SubmissionStatus::NotStarted))
    }

    /// Deadline sweep: lock every unlocked submission whose cycle deadline
    /// has passed. Server-authoritative, bypasses per-request checks, and
    /// never stamps `submitted_at` for the user.
    pub async fn lock_past_deadline(&self, now: DateTime<Utc>) -> Result<u64> {
        let unlocked = self.db.submissions.list_unlocked().await?;
        let mut locked_count = 0;

        for submission in unlocked {
            let deadline = match cycle::deadline_for_cycle(&submission.cycle_id) {
                Ok(deadline) => deadline,
                Err(e) => {
                    warn!(submission_id = submission.id, cycle_id = %submission.cycle_id, error = %e, "Skipping submission with unparseable cycle");
                    continue;
                }
            };

            if now >= deadline {
                self.db.submissions.lock(submission.id, now, false).await?;
                locked_count += 1;
            }
        }

        if locked_count > 0 {
            info!(locked_count = locked_count, "Deadline sweep locked submissions");
        }
        Ok(locked_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::membership::{ROLE_ADMIN, ROLE_MEMBER};
    use crate::models::user::CreateUserRequest;

    async fn setup() -> (SubmissionService, i64, i64, i64) {
        let db = DatabaseService::in_memory();
        let service = SubmissionService::new(db.clone());

        let user = db
            .users
            .create(CreateUserRequest {
                subject: "subj-1".to_string(),
                email: "ada@example.com".to_string(),
                name: Some("Ada".to_string()),
                image_url: None,
            })
            .await
            .unwrap();

        let circle = db
            .circles
            .create(crate::models::circle::CreateCircleRequest {
                name: "Weekend Crew".to_string(),
                description: None,
                timezone: "UTC".to_string(),
                admin_id: user.id,
                invite_code: "code-1".to_string(),
            })
            .await
            .unwrap();

        db.memberships.insert(user.id, circle.id, ROLE_ADMIN).await.unwrap();
        let prompt = db.circles.insert_prompt(circle.id, "One Good Thing", 0).await.unwrap();

        (service, user.id, circle.id, prompt.id)
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let (service, user_id, circle_id, _) = setup().await;

        service.create_submission(user_id, circle_id, "2026-03").await.unwrap();
        let second = service.create_submission(user_id, circle_id, "2026-03").await;

        assert!(matches!(second, Err(SecondSaturdayError::SubmissionAlreadyExists)));
    }

    #[tokio::test]
    async fn test_invalid_cycle_id_rejected() {
        let (service, user_id, circle_id, _) = setup().await;

        assert!(service.create_submission(user_id, circle_id, "2026-3").await.is_err());
        assert!(service.create_submission(user_id, circle_id, "1999-03").await.is_err());
    }

    #[tokio::test]
    async fn test_non_member_cannot_create() {
        let (service, _, circle_id, _) = setup().await;

        let result = service.create_submission(9999, circle_id, "2026-03").await;
        assert!(matches!(result, Err(SecondSaturdayError::NotAMember)));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_single_response() {
        let (service, user_id, circle_id, prompt_id) = setup().await;

        let submission = service.create_submission(user_id, circle_id, "2026-03").await.unwrap();
        let first = service.upsert_response(user_id, submission.id, prompt_id, "draft one").await.unwrap();
        let second = service.upsert_response(user_id, submission.id, prompt_id, "draft two").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.text, "draft two");
    }

    #[tokio::test]
    async fn test_upsert_on_locked_submission_fails() {
        let (service, user_id, circle_id, prompt_id) = setup().await;

        let submission = service.create_submission(user_id, circle_id, "2026-03").await.unwrap();
        service.lock_submission(user_id, submission.id).await.unwrap();

        let result = service.upsert_response(user_id, submission.id, prompt_id, "late edit").await;
        assert!(matches!(result, Err(SecondSaturdayError::SubmissionLocked)));
    }

    #[tokio::test]
    async fn test_text_length_cap() {
        let (service, user_id, circle_id, prompt_id) = setup().await;

        let submission = service.create_submission(user_id, circle_id, "2026-03").await.unwrap();
        let long_text = "x".repeat(501);

        let result = service.upsert_response(user_id, submission.id, prompt_id, &long_text).await;
        assert!(matches!(result, Err(SecondSaturdayError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_lock_is_one_way() {
        let (service, user_id, circle_id, _) = setup().await;

        let submission = service.create_submission(user_id, circle_id, "2026-03").await.unwrap();
        let locked = service.lock_submission(user_id, submission.id).await.unwrap();
        assert!(locked.locked_at.is_some());
        assert!(locked.submitted_at.is_some());

        let again = service.lock_submission(user_id, submission.id).await;
        assert!(matches!(again, Err(SecondSaturdayError::SubmissionAlreadyLocked)));
    }

    #[tokio::test]
    async fn test_save_draft_creates_submission_transparently() {
        let (service, user_id, circle_id, prompt_id) = setup().await;

        assert_eq!(
            service.submission_status(user_id, circle_id, "2026-03").await.unwrap(),
            SubmissionStatus::NotStarted
        );

        service.save_draft(user_id, circle_id, "2026-03", prompt_id, "typed text").await.unwrap();

        assert_eq!(
            service.submission_status(user_id, circle_id, "2026-03").await.unwrap(),
            SubmissionStatus::InProgress
        );

        // repeated autosaves reuse the same submission
        service.save_draft(user_id, circle_id, "2026-03", prompt_id, "typed more").await.unwrap();
        let submission = service
            .db
            .submissions
            .find_by_user_circle_cycle(user_id, circle_id, "2026-03")
            .await
            .unwrap()
            .unwrap();
        let responses = service.db.submissions.list_responses(submission.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].text, "typed more");
    }

    #[tokio::test]
    async fn test_media_cap_and_repack() {
        let (service, user_id, circle_id, prompt_id) = setup().await;

        let submission = service.create_submission(user_id, circle_id, "2026-03").await.unwrap();
        let response = service.upsert_response(user_id, submission.id, prompt_id, "with media").await.unwrap();

        let request = |n: u32| AddMediaRequest {
            response_id: response.id,
            kind: MEDIA_KIND_IMAGE.to_string(),
            storage_id: Some(format!("obj-{n}")),
            asset_id: None,
            thumbnail_url: None,
        };

        let m0 = service.add_media(user_id, request(0)).await.unwrap();
        let m1 = service.add_media(user_id, request(1)).await.unwrap();
        let m2 = service.add_media(user_id, request(2)).await.unwrap();
        assert_eq!((m0.position, m1.position, m2.position), (0, 1, 2));

        let fourth = service.add_media(user_id, request(3)).await;
        assert!(matches!(fourth, Err(SecondSaturdayError::MediaLimitReached)));

        service.remove_media(user_id, m1.id).await.unwrap();
        let remaining = service.db.submissions.list_media(response.id).await.unwrap();
        let positions: Vec<i32> = remaining.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_deadline_sweep_locks_only_past_deadline() {
        let (service, user_id, circle_id, _) = setup().await;

        // a member of a second circle in a different cycle state
        let other_user = service
            .db
            .users
            .create(CreateUserRequest {
                subject: "subj-2".to_string(),
                email: "grace@example.com".to_string(),
                name: None,
                image_url: None,
            })
            .await
            .unwrap();
        service.db.memberships.insert(other_user.id, circle_id, ROLE_MEMBER).await.unwrap();

        let overdue = service.create_submission(user_id, circle_id, "2026-02").await.unwrap();
        let current = service.create_submission(other_user.id, circle_id, "2026-03").await.unwrap();

        // Between the February and March 2026 deadlines
        let now = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let locked = service.lock_past_deadline(now).await.unwrap();
        assert_eq!(locked, 1);

        let overdue = service.db.submissions.find_by_id(overdue.id).await.unwrap().unwrap();
        assert!(overdue.is_locked());
        // sweep-locked drafts are not treated as submitted
        assert!(overdue.submitted_at.is_none());

        let current = service.db.submissions.find_by_id(current.id).await.unwrap().unwrap();
        assert!(!current.is_locked());
    }
}
