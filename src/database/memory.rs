//! In-memory repository implementations
//!
//! Backing store for the test suite and for running the lifecycle engine
//! without PostgreSQL. Each repository guards its tables with a single lock,
//! which gives the multi-row operations (response upsert, media re-pack,
//! redaction cascade) the same atomicity the SQL implementations get from a
//! transaction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::circle::{Circle, Prompt, CreateCircleRequest, UpdateCircleRequest, PromptInput};
use crate::models::membership::{Membership, ROLE_MEMBER};
use crate::models::newsletter::{
    AdminReminder, CreateNewsletterRequest, Newsletter, NotificationPreference,
    NEWSLETTER_STATUS_PUBLISHED,
};
use crate::models::submission::{AddMediaRequest, Media, Response, Submission};
use crate::models::user::{CreateUserRequest, UpdateUserRequest, User};
use crate::models::video::{
    CreateVideoRequest, Video, VIDEO_STATUS_ERROR, VIDEO_STATUS_PROCESSING, VIDEO_STATUS_READY,
    VIDEO_STATUS_UPLOADING,
};
use crate::utils::errors::SecondSaturdayError;

use super::repositories::{
    CircleRepository, MembershipRepository, NewsletterRepository, PreferenceRepository,
    ReminderRepository, SubmissionRepository, UserRepository, VideoRepository,
};

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UserTable {
    rows: HashMap<i64, User>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    table: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_id);
        let now = Utc::now();
        let user = User {
            id,
            subject: request.subject,
            email: request.email,
            name: request.name,
            image_url: request.image_url,
            avatar_storage_id: None,
            timezone: None,
            push_player_id: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, user.clone());
        Ok(user)
    }

    async fn upsert_by_subject(&self, request: CreateUserRequest) -> Result<User, SecondSaturdayError> {
        {
            let mut table = self.table.write().unwrap();
            if let Some(user) = table.rows.values_mut().find(|u| u.subject == request.subject) {
                user.email = request.email.clone();
                user.name = request.name.clone();
                user.image_url = request.image_url.clone();
                user.updated_at = Utc::now();
                return Ok(user.clone());
            }
        }
        self.create(request).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, SecondSaturdayError> {
        Ok(self.table.read().unwrap().rows.get(&id).cloned())
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .find(|u| u.subject == subject)
            .cloned())
    }

    async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let user = table
            .rows
            .get_mut(&id)
            .ok_or(SecondSaturdayError::UserNotFound { user_id: id })?;
        if let Some(email) = request.email {
            user.email = email;
        }
        if let Some(name) = request.name {
            user.name = Some(name);
        }
        if let Some(image_url) = request.image_url {
            user.image_url = Some(image_url);
        }
        if let Some(avatar) = request.avatar_storage_id {
            user.avatar_storage_id = Some(avatar);
        }
        if let Some(timezone) = request.timezone {
            user.timezone = Some(timezone);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_push_player_id(&self, id: i64, player_id: &str) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(user) = table.rows.get_mut(&id) {
            user.push_player_id = Some(player_id.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), SecondSaturdayError> {
        self.table.write().unwrap().rows.remove(&id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Circles and prompts
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CircleTable {
    circles: HashMap<i64, Circle>,
    prompts: HashMap<i64, Prompt>,
    next_circle_id: i64,
    next_prompt_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryCircleRepository {
    table: Arc<RwLock<CircleTable>>,
}

impl InMemoryCircleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CircleRepository for InMemoryCircleRepository {
    async fn create(&self, request: CreateCircleRequest) -> Result<Circle, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_circle_id);
        let now = Utc::now();
        let circle = Circle {
            id,
            name: request.name,
            description: request.description,
            admin_id: request.admin_id,
            invite_code: request.invite_code,
            timezone: request.timezone,
            archived_at: None,
            created_at: now,
            updated_at: now,
        };
        table.circles.insert(id, circle.clone());
        Ok(circle)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Circle>, SecondSaturdayError> {
        Ok(self.table.read().unwrap().circles.get(&id).cloned())
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Circle>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .circles
            .values()
            .find(|c| c.invite_code == code)
            .cloned())
    }

    async fn update(&self, id: i64, request: UpdateCircleRequest) -> Result<Circle, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let circle = table
            .circles
            .get_mut(&id)
            .ok_or(SecondSaturdayError::CircleNotFound { circle_id: id })?;
        if let Some(name) = request.name {
            circle.name = name;
        }
        if let Some(description) = request.description {
            circle.description = Some(description);
        }
        circle.updated_at = Utc::now();
        Ok(circle.clone())
    }

    async fn set_invite_code(&self, id: i64, code: &str) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(circle) = table.circles.get_mut(&id) {
            circle.invite_code = code.to_string();
            circle.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_admin(&self, id: i64, admin_id: i64) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(circle) = table.circles.get_mut(&id) {
            circle.admin_id = admin_id;
            circle.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn archive(&self, id: i64) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(circle) = table.circles.get_mut(&id) {
            if circle.archived_at.is_none() {
                circle.archived_at = Some(Utc::now());
                circle.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Circle>, SecondSaturdayError> {
        let mut circles: Vec<Circle> = self
            .table
            .read()
            .unwrap()
            .circles
            .values()
            .filter(|c| c.archived_at.is_none())
            .cloned()
            .collect();
        circles.sort_by_key(|c| c.id);
        Ok(circles)
    }

    async fn list_admined_by(&self, user_id: i64) -> Result<Vec<Circle>, SecondSaturdayError> {
        let mut circles: Vec<Circle> = self
            .table
            .read()
            .unwrap()
            .circles
            .values()
            .filter(|c| c.admin_id == user_id && c.archived_at.is_none())
            .cloned()
            .collect();
        circles.sort_by_key(|c| c.id);
        Ok(circles)
    }

    async fn insert_prompt(&self, circle_id: i64, text: &str, position: i32) -> Result<Prompt, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_prompt_id);
        let prompt = Prompt {
            id,
            circle_id,
            text: text.to_string(),
            position,
            active: true,
            created_at: Utc::now(),
        };
        table.prompts.insert(id, prompt.clone());
        Ok(prompt)
    }

    async fn find_prompt(&self, id: i64) -> Result<Option<Prompt>, SecondSaturdayError> {
        Ok(self.table.read().unwrap().prompts.get(&id).cloned())
    }

    async fn list_active_prompts(&self, circle_id: i64) -> Result<Vec<Prompt>, SecondSaturdayError> {
        let mut prompts: Vec<Prompt> = self
            .table
            .read()
            .unwrap()
            .prompts
            .values()
            .filter(|p| p.circle_id == circle_id && p.active)
            .cloned()
            .collect();
        prompts.sort_by_key(|p| p.position);
        Ok(prompts)
    }

    async fn replace_prompts(&self, circle_id: i64, prompts: Vec<PromptInput>) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        for prompt in table.prompts.values_mut() {
            if prompt.circle_id == circle_id {
                prompt.active = false;
            }
        }
        let now = Utc::now();
        for input in prompts {
            match input.id {
                Some(id) => {
                    if let Some(prompt) = table.prompts.get_mut(&id) {
                        if prompt.circle_id == circle_id {
                            prompt.text = input.text;
                            prompt.position = input.position;
                            prompt.active = true;
                        }
                    }
                }
                None => {
                    let id = next_id(&mut table.next_prompt_id);
                    table.prompts.insert(
                        id,
                        Prompt {
                            id,
                            circle_id,
                            text: input.text,
                            position: input.position,
                            active: true,
                            created_at: now,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MembershipTable {
    rows: HashMap<i64, Membership>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryMembershipRepository {
    table: Arc<RwLock<MembershipTable>>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn insert(&self, user_id: i64, circle_id: i64, role: &str) -> Result<Membership, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_id);
        let membership = Membership {
            id,
            user_id,
            circle_id,
            role: role.to_string(),
            joined_at: Utc::now(),
            left_at: None,
            blocked: false,
        };
        table.rows.insert(id, membership.clone());
        Ok(membership)
    }

    async fn find_by_user_circle(&self, user_id: i64, circle_id: i64) -> Result<Option<Membership>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .find(|m| m.user_id == user_id && m.circle_id == circle_id)
            .cloned())
    }

    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Membership>, SecondSaturdayError> {
        let mut memberships: Vec<Membership> = self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .filter(|m| m.circle_id == circle_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.id);
        Ok(memberships)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Membership>, SecondSaturdayError> {
        let mut memberships: Vec<Membership> = self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.id);
        Ok(memberships)
    }

    async fn reactivate(&self, id: i64) -> Result<Membership, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let membership = table.rows.get_mut(&id).ok_or(SecondSaturdayError::NotAMember)?;
        membership.left_at = None;
        membership.joined_at = Utc::now();
        membership.role = ROLE_MEMBER.to_string();
        Ok(membership.clone())
    }

    async fn set_left(&self, id: i64) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(membership) = table.rows.get_mut(&id) {
            membership.left_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_left_and_blocked(&self, id: i64) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(membership) = table.rows.get_mut(&id) {
            membership.left_at = Some(Utc::now());
            membership.blocked = true;
        }
        Ok(())
    }

    async fn set_role(&self, id: i64, role: &str) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(membership) = table.rows.get_mut(&id) {
            membership.role = role.to_string();
        }
        Ok(())
    }

    async fn mark_all_left_for_user(&self, user_id: i64) -> Result<u64, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let now = Utc::now();
        let mut affected = 0;
        for membership in table.rows.values_mut() {
            if membership.user_id == user_id && membership.left_at.is_none() {
                membership.left_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// Submissions, responses and media
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SubmissionTable {
    submissions: HashMap<i64, Submission>,
    responses: HashMap<i64, Response>,
    media: HashMap<i64, Media>,
    next_submission_id: i64,
    next_response_id: i64,
    next_media_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemorySubmissionRepository {
    table: Arc<RwLock<SubmissionTable>>,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn create(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Submission, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if table
            .submissions
            .values()
            .any(|s| s.user_id == user_id && s.circle_id == circle_id && s.cycle_id == cycle_id)
        {
            return Err(SecondSaturdayError::SubmissionAlreadyExists);
        }
        let id = next_id(&mut table.next_submission_id);
        let now = Utc::now();
        let submission = Submission {
            id,
            user_id,
            circle_id,
            cycle_id: cycle_id.to_string(),
            submitted_at: None,
            locked_at: None,
            created_at: now,
            updated_at: now,
        };
        table.submissions.insert(id, submission.clone());
        Ok(submission)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Submission>, SecondSaturdayError> {
        Ok(self.table.read().unwrap().submissions.get(&id).cloned())
    }

    async fn find_by_user_circle_cycle(&self, user_id: i64, circle_id: i64, cycle_id: &str) -> Result<Option<Submission>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .submissions
            .values()
            .find(|s| s.user_id == user_id && s.circle_id == circle_id && s.cycle_id == cycle_id)
            .cloned())
    }

    async fn list_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Vec<Submission>, SecondSaturdayError> {
        let mut submissions: Vec<Submission> = self
            .table
            .read()
            .unwrap()
            .submissions
            .values()
            .filter(|s| s.circle_id == circle_id && s.cycle_id == cycle_id)
            .cloned()
            .collect();
        submissions.sort_by_key(|s| s.id);
        Ok(submissions)
    }

    async fn list_unlocked(&self) -> Result<Vec<Submission>, SecondSaturdayError> {
        let mut submissions: Vec<Submission> = self
            .table
            .read()
            .unwrap()
            .submissions
            .values()
            .filter(|s| s.locked_at.is_none())
            .cloned()
            .collect();
        submissions.sort_by_key(|s| s.id);
        Ok(submissions)
    }

    async fn lock(&self, id: i64, now: DateTime<Utc>, stamp_submitted: bool) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(submission) = table.submissions.get_mut(&id) {
            submission.locked_at = Some(now);
            if stamp_submitted && submission.submitted_at.is_none() {
                submission.submitted_at = Some(now);
            }
            submission.updated_at = now;
        }
        Ok(())
    }

    async fn upsert_response(&self, submission_id: i64, prompt_id: i64, text: &str) -> Result<Response, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let now = Utc::now();

        let existing_id = table
            .responses
            .values()
            .find(|r| r.submission_id == submission_id && r.prompt_id == prompt_id)
            .map(|r| r.id);

        let response = match existing_id {
            Some(id) => {
                let response = table.responses.get_mut(&id).unwrap();
                response.text = text.to_string();
                response.updated_at = now;
                response.clone()
            }
            None => {
                let id = next_id(&mut table.next_response_id);
                let response = Response {
                    id,
                    submission_id,
                    prompt_id,
                    text: text.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                table.responses.insert(id, response.clone());
                response
            }
        };

        if let Some(submission) = table.submissions.get_mut(&submission_id) {
            submission.updated_at = now;
        }

        Ok(response)
    }

    async fn find_response(&self, submission_id: i64, prompt_id: i64) -> Result<Option<Response>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .responses
            .values()
            .find(|r| r.submission_id == submission_id && r.prompt_id == prompt_id)
            .cloned())
    }

    async fn find_response_by_id(&self, id: i64) -> Result<Option<Response>, SecondSaturdayError> {
        Ok(self.table.read().unwrap().responses.get(&id).cloned())
    }

    async fn list_responses(&self, submission_id: i64) -> Result<Vec<Response>, SecondSaturdayError> {
        let mut responses: Vec<Response> = self
            .table
            .read()
            .unwrap()
            .responses
            .values()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.id);
        Ok(responses)
    }

    async fn add_media(&self, request: AddMediaRequest, position: i32) -> Result<Media, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_media_id);
        let media = Media {
            id,
            response_id: request.response_id,
            kind: request.kind,
            storage_id: request.storage_id,
            asset_id: request.asset_id,
            thumbnail_url: request.thumbnail_url,
            position,
            created_at: Utc::now(),
        };
        table.media.insert(id, media.clone());
        Ok(media)
    }

    async fn find_media(&self, id: i64) -> Result<Option<Media>, SecondSaturdayError> {
        Ok(self.table.read().unwrap().media.get(&id).cloned())
    }

    async fn list_media(&self, response_id: i64) -> Result<Vec<Media>, SecondSaturdayError> {
        let mut media: Vec<Media> = self
            .table
            .read()
            .unwrap()
            .media
            .values()
            .filter(|m| m.response_id == response_id)
            .cloned()
            .collect();
        media.sort_by_key(|m| m.position);
        Ok(media)
    }

    async fn remove_media(&self, id: i64) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let removed = match table.media.remove(&id) {
            Some(media) => media,
            None => return Ok(()),
        };

        let mut remaining: Vec<i64> = table
            .media
            .values()
            .filter(|m| m.response_id == removed.response_id)
            .map(|m| m.id)
            .collect();
        remaining.sort_by_key(|id| table.media[id].position);

        for (index, media_id) in remaining.iter().enumerate() {
            if let Some(media) = table.media.get_mut(media_id) {
                media.position = index as i32;
            }
        }
        Ok(())
    }

    async fn redact_member_content(&self, user_id: i64, circle_id: i64, marker: &str) -> Result<Vec<String>, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let now = Utc::now();

        let submission_ids: Vec<i64> = table
            .submissions
            .values()
            .filter(|s| s.user_id == user_id && s.circle_id == circle_id)
            .map(|s| s.id)
            .collect();

        let mut response_ids = Vec::new();
        for response in table.responses.values_mut() {
            if submission_ids.contains(&response.submission_id) {
                response.text = marker.to_string();
                response.updated_at = now;
                response_ids.push(response.id);
            }
        }

        let doomed: Vec<i64> = table
            .media
            .values()
            .filter(|m| response_ids.contains(&m.response_id))
            .map(|m| m.id)
            .collect();

        let mut storage_ids = Vec::new();
        for id in doomed {
            if let Some(media) = table.media.remove(&id) {
                if let Some(storage_id) = media.storage_id {
                    storage_ids.push(storage_id);
                }
            }
        }

        Ok(storage_ids)
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<Vec<String>, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();

        let submission_ids: Vec<i64> = table
            .submissions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();

        let response_ids: Vec<i64> = table
            .responses
            .values()
            .filter(|r| submission_ids.contains(&r.submission_id))
            .map(|r| r.id)
            .collect();

        let doomed_media: Vec<i64> = table
            .media
            .values()
            .filter(|m| response_ids.contains(&m.response_id))
            .map(|m| m.id)
            .collect();

        let mut storage_ids = Vec::new();
        for id in doomed_media {
            if let Some(media) = table.media.remove(&id) {
                if let Some(storage_id) = media.storage_id {
                    storage_ids.push(storage_id);
                }
            }
        }
        for id in response_ids {
            table.responses.remove(&id);
        }
        for id in submission_ids {
            table.submissions.remove(&id);
        }

        Ok(storage_ids)
    }
}

// ---------------------------------------------------------------------------
// Newsletters
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NewsletterTable {
    rows: HashMap<i64, Newsletter>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryNewsletterRepository {
    table: Arc<RwLock<NewsletterTable>>,
}

impl InMemoryNewsletterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsletterRepository for InMemoryNewsletterRepository {
    async fn insert(&self, request: CreateNewsletterRequest) -> Result<Newsletter, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if table
            .rows
            .values()
            .any(|n| n.circle_id == request.circle_id && n.cycle_id == request.cycle_id)
        {
            return Err(SecondSaturdayError::NewsletterAlreadyCompiled {
                circle_id: request.circle_id,
                cycle_id: request.cycle_id,
            });
        }

        let prior = table
            .rows
            .values()
            .filter(|n| n.circle_id == request.circle_id)
            .count() as i32;

        let id = next_id(&mut table.next_id);
        let newsletter = Newsletter {
            id,
            circle_id: request.circle_id,
            cycle_id: request.cycle_id,
            title: request.title,
            issue_number: prior + 1,
            sections: request.sections,
            submission_count: request.submission_count,
            member_count: request.member_count,
            recipient_count: None,
            status: NEWSLETTER_STATUS_PUBLISHED.to_string(),
            published_at: Some(request.published_at),
            created_at: Utc::now(),
        };
        table.rows.insert(id, newsletter.clone());
        Ok(newsletter)
    }

    async fn find_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Option<Newsletter>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .find(|n| n.circle_id == circle_id && n.cycle_id == cycle_id)
            .cloned())
    }

    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Newsletter>, SecondSaturdayError> {
        let mut newsletters: Vec<Newsletter> = self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .filter(|n| n.circle_id == circle_id)
            .cloned()
            .collect();
        newsletters.sort_by_key(|n| std::cmp::Reverse(n.issue_number));
        Ok(newsletters)
    }

    async fn count_by_circle(&self, circle_id: i64) -> Result<i64, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .filter(|n| n.circle_id == circle_id)
            .count() as i64)
    }

    async fn set_recipient_count(&self, id: i64, count: i32) -> Result<(), SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        if let Some(newsletter) = table.rows.get_mut(&id) {
            newsletter.recipient_count = Some(count);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Admin reminders and notification preferences
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ReminderTable {
    rows: HashMap<i64, AdminReminder>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryReminderRepository {
    table: Arc<RwLock<ReminderTable>>,
}

impl InMemoryReminderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReminderRepository for InMemoryReminderRepository {
    async fn count_for(&self, admin_user_id: i64, circle_id: i64, cycle_id: &str) -> Result<i64, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .filter(|r| {
                r.admin_user_id == admin_user_id && r.circle_id == circle_id && r.cycle_id == cycle_id
            })
            .count() as i64)
    }

    async fn insert(&self, circle_id: i64, admin_user_id: i64, target_user_id: Option<i64>, cycle_id: &str) -> Result<AdminReminder, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_id);
        let reminder = AdminReminder {
            id,
            circle_id,
            admin_user_id,
            target_user_id,
            cycle_id: cycle_id.to_string(),
            sent_at: Utc::now(),
        };
        table.rows.insert(id, reminder.clone());
        Ok(reminder)
    }

    async fn delete_for_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<u64, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let doomed: Vec<i64> = table
            .rows
            .values()
            .filter(|r| r.circle_id == circle_id && r.cycle_id == cycle_id)
            .map(|r| r.id)
            .collect();
        let count = doomed.len() as u64;
        for id in doomed {
            table.rows.remove(&id);
        }
        Ok(count)
    }
}

#[derive(Default)]
struct PreferenceTable {
    rows: HashMap<i64, NotificationPreference>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryPreferenceRepository {
    table: Arc<RwLock<PreferenceTable>>,
}

impl InMemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<NotificationPreference>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn upsert(&self, user_id: i64, submission_reminders: bool, newsletter_ready: bool) -> Result<NotificationPreference, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let now = Utc::now();

        let existing_id = table.rows.values().find(|p| p.user_id == user_id).map(|p| p.id);
        match existing_id {
            Some(id) => {
                let preference = table.rows.get_mut(&id).unwrap();
                preference.submission_reminders = submission_reminders;
                preference.newsletter_ready = newsletter_ready;
                preference.updated_at = now;
                Ok(preference.clone())
            }
            None => {
                let id = next_id(&mut table.next_id);
                let preference = NotificationPreference {
                    id,
                    user_id,
                    submission_reminders,
                    newsletter_ready,
                    created_at: now,
                    updated_at: now,
                };
                table.rows.insert(id, preference.clone());
                Ok(preference)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Videos
// ---------------------------------------------------------------------------

#[derive(Default)]
struct VideoTable {
    rows: HashMap<i64, Video>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryVideoRepository {
    table: Arc<RwLock<VideoTable>>,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn create(&self, request: CreateVideoRequest) -> Result<Video, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let id = next_id(&mut table.next_id);
        let now = Utc::now();
        let video = Video {
            id,
            upload_id: request.upload_id,
            asset_id: None,
            playback_id: None,
            user_id: request.user_id,
            circle_id: request.circle_id,
            title: request.title,
            duration: None,
            aspect_ratio: None,
            status: VIDEO_STATUS_UPLOADING.to_string(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, video.clone());
        Ok(video)
    }

    async fn find_by_upload_id(&self, upload_id: &str) -> Result<Option<Video>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .find(|v| v.upload_id == upload_id)
            .cloned())
    }

    async fn find_by_asset_id(&self, asset_id: &str) -> Result<Option<Video>, SecondSaturdayError> {
        Ok(self
            .table
            .read()
            .unwrap()
            .rows
            .values()
            .find(|v| v.asset_id.as_deref() == Some(asset_id))
            .cloned())
    }

    async fn attach_asset(&self, upload_id: &str, asset_id: &str) -> Result<Option<Video>, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let video = table.rows.values_mut().find(|v| v.upload_id == upload_id);
        Ok(video.map(|v| {
            v.asset_id = Some(asset_id.to_string());
            v.status = VIDEO_STATUS_PROCESSING.to_string();
            v.updated_at = Utc::now();
            v.clone()
        }))
    }

    async fn mark_ready(&self, asset_id: &str, playback_id: &str, duration: Option<f64>, aspect_ratio: Option<&str>) -> Result<Option<Video>, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let video = table
            .rows
            .values_mut()
            .find(|v| v.asset_id.as_deref() == Some(asset_id));
        Ok(video.map(|v| {
            v.playback_id = Some(playback_id.to_string());
            v.duration = duration;
            v.aspect_ratio = aspect_ratio.map(|s| s.to_string());
            v.status = VIDEO_STATUS_READY.to_string();
            v.updated_at = Utc::now();
            v.clone()
        }))
    }

    async fn mark_error(&self, asset_id: &str, error: Option<&str>) -> Result<Option<Video>, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let video = table
            .rows
            .values_mut()
            .find(|v| v.asset_id.as_deref() == Some(asset_id));
        Ok(video.map(|v| {
            v.status = VIDEO_STATUS_ERROR.to_string();
            v.error = error.map(|s| s.to_string());
            v.updated_at = Utc::now();
            v.clone()
        }))
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, SecondSaturdayError> {
        let mut table = self.table.write().unwrap();
        let doomed: Vec<i64> = table
            .rows
            .values()
            .filter(|v| v.user_id == user_id)
            .map(|v| v.id)
            .collect();
        let count = doomed.len() as u64;
        for id in doomed {
            table.rows.remove(&id);
        }
        Ok(count)
    }
}
