//! Newsletter compiler
//!
//! Aggregates a circle's locked submissions into one issue per cycle. A
//! cycle with zero locked submissions is a missed month and produces no
//! newsletter row; a cycle that already has one reports the existing issue
//! instead of minting a duplicate.

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, debug};
use crate::database::DatabaseService;
use crate::models::circle::Circle;
use crate::models::newsletter::{
    CreateNewsletterRequest, Newsletter, NewsletterSection, SectionMedia, SectionResponse,
};
use crate::models::submission::MEDIA_KIND_IMAGE;
use crate::services::cycle;
use crate::services::storage::StorageService;
use crate::utils::errors::{SecondSaturdayError, Result};

/// Name used when a submitter's profile resolves to nothing
pub const UNKNOWN_MEMBER: &str = "Unknown Member";

/// Result of a compile attempt for one (circle, cycle)
#[derive(Debug, Clone)]
pub enum CompileOutcome {
    /// An issue was created from at least one locked submission
    Compiled(Newsletter),
    /// Zero locked submissions; no newsletter row exists for the cycle
    MissedMonth,
    /// A prior invocation already created this cycle's issue
    AlreadyCompiled(Newsletter),
}

/// Newsletter compiler service
#[derive(Clone)]
pub struct NewsletterService {
    db: DatabaseService,
    storage: StorageService,
}

impl NewsletterService {
    /// Create a new NewsletterService instance
    pub fn new(db: DatabaseService, storage: StorageService) -> Self {
        Self { db, storage }
    }

    /// Compile the newsletter for a (circle, cycle). Idempotent: at most one
    /// newsletter row ever exists for the pair.
    pub async fn compile(&self, circle_id: i64, cycle_id: &str, now: DateTime<Utc>) -> Result<CompileOutcome> {
        debug!(circle_id = circle_id, cycle_id = %cycle_id, "Compiling newsletter");

        let circle = self
            .db
            .circles
            .find_by_id(circle_id)
            .await?
            .ok_or(SecondSaturdayError::CircleNotFound { circle_id })?;

        if let Some(existing) = self.db.newsletters.find_by_circle_cycle(circle_id, cycle_id).await? {
            debug!(circle_id = circle_id, cycle_id = %cycle_id, issue_number = existing.issue_number, "Newsletter already compiled");
            return Ok(CompileOutcome::AlreadyCompiled(existing));
        }

        let submissions = self.db.submissions.list_by_circle_cycle(circle_id, cycle_id).await?;
        let locked: Vec<_> = submissions.into_iter().filter(|s| s.is_locked()).collect();

        if locked.is_empty() {
            info!(circle_id = circle_id, cycle_id = %cycle_id, "Missed month: no locked submissions");
            return Ok(CompileOutcome::MissedMonth);
        }

        let mut member_names: HashMap<i64, String> = HashMap::new();
        for submission in &locked {
            let name = self
                .db
                .users
                .find_by_id(submission.user_id)
                .await?
                .map(|u| u.display_name())
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_string());
            member_names.insert(submission.user_id, name);
        }

        let prompts = self.db.circles.list_active_prompts(circle_id).await?;
        let mut sections = Vec::new();

        for prompt in &prompts {
            let mut responses = Vec::new();

            for submission in &locked {
                let response = match self.db.submissions.find_response(submission.id, prompt.id).await? {
                    Some(response) => response,
                    None => continue,
                };

                let mut media = Vec::new();
                for item in self.db.submissions.list_media(response.id).await? {
                    if item.kind == MEDIA_KIND_IMAGE {
                        if let Some(storage_id) = &item.storage_id {
                            media.push(SectionMedia {
                                kind: item.kind.clone(),
                                url: self.storage.public_url(storage_id),
                                thumbnail_url: item.thumbnail_url.clone(),
                            });
                        }
                    }
                }

                responses.push(SectionResponse {
                    member_name: member_names
                        .get(&submission.user_id)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_MEMBER.to_string()),
                    text: response.text,
                    media,
                });
            }

            // prompts nobody answered are left out entirely
            if !responses.is_empty() {
                sections.push(NewsletterSection {
                    prompt_title: prompt.text.clone(),
                    responses,
                });
            }
        }

        let member_count = self
            .db
            .memberships
            .list_by_circle(circle_id)
            .await?
            .iter()
            .filter(|m| m.is_active())
            .count() as i32;

        let newsletter = self
            .db
            .newsletters
            .insert(CreateNewsletterRequest {
                circle_id,
                cycle_id: cycle_id.to_string(),
                title: issue_title(&circle, cycle_id),
                sections: json!({ "sections": sections }),
                submission_count: locked.len() as i32,
                member_count,
                published_at: now,
            })
            .await?;

        info!(
            circle_id = circle_id,
            cycle_id = %cycle_id,
            issue_number = newsletter.issue_number,
            submission_count = newsletter.submission_count,
            "Newsletter compiled"
        );
        Ok(CompileOutcome::Compiled(newsletter))
    }

    /// Record how many recipients the send actually reached
    pub async fn record_recipient_count(&self, newsletter_id: i64, count: i32) -> Result<()> {
        self.db.newsletters.set_recipient_count(newsletter_id, count).await
    }
}

/// Issue title: "{circle} - {Month YYYY}"
fn issue_title(circle: &Circle, cycle_id: &str) -> String {
    match cycle::parse_cycle_id(cycle_id) {
        Ok((year, month)) => format!("{} - {} {}", circle.name, cycle::month_name(month), year),
        Err(_) => format!("{} - {}", circle.name, cycle_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::config::StorageConfig;
    use crate::models::circle::CreateCircleRequest;
    use crate::models::membership::{ROLE_ADMIN, ROLE_MEMBER};
    use crate::models::user::CreateUserRequest;

    struct Fixture {
        db: DatabaseService,
        service: NewsletterService,
        circle_id: i64,
        admin_id: i64,
        member_id: i64,
        prompt_one: i64,
        prompt_two: i64,
    }

    async fn setup() -> Fixture {
        let db = DatabaseService::in_memory();
        let storage = StorageService::new(StorageConfig {
            api_url: "https://storage.example.com".to_string(),
            api_key: String::new(),
            timeout_seconds: 1,
        })
        .unwrap();
        let service = NewsletterService::new(db.clone(), storage);

        let admin = db
            .users
            .create(CreateUserRequest {
                subject: "subj-admin".to_string(),
                email: "admin@example.com".to_string(),
                name: Some("Ada".to_string()),
                image_url: None,
            })
            .await
            .unwrap();
        let member = db
            .users
            .create(CreateUserRequest {
                subject: "subj-member".to_string(),
                email: "grace@example.com".to_string(),
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

        let prompt_one = db.circles.insert_prompt(circle.id, "One Good Thing", 0).await.unwrap();
        let prompt_two = db.circles.insert_prompt(circle.id, "On Your Mind", 1).await.unwrap();

        Fixture {
            db,
            service,
            circle_id: circle.id,
            admin_id: admin.id,
            member_id: member.id,
            prompt_one: prompt_one.id,
            prompt_two: prompt_two.id,
        }
    }

    fn compile_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 0).unwrap()
    }

    async fn locked_submission(f: &Fixture, user_id: i64, prompt_id: i64, text: &str) {
        let submission = f.db.submissions.create(user_id, f.circle_id, "2026-03").await.unwrap();
        f.db.submissions.upsert_response(submission.id, prompt_id, text).await.unwrap();
        f.db.submissions.lock(submission.id, compile_instant(), true).await.unwrap();
    }

    fn sections_of(newsletter: &Newsletter) -> Vec<NewsletterSection> {
        serde_json::from_value(newsletter.sections["sections"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_missed_month_when_no_locked_submissions() {
        let f = setup().await;

        // an in-progress draft does not rescue the month
        f.db.submissions.create(f.admin_id, f.circle_id, "2026-03").await.unwrap();

        let outcome = f.service.compile(f.circle_id, "2026-03", compile_instant()).await.unwrap();
        assert!(matches!(outcome, CompileOutcome::MissedMonth));

        assert!(f
            .db
            .newsletters
            .find_by_circle_cycle(f.circle_id, "2026-03")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_sections_are_omitted() {
        let f = setup().await;
        locked_submission(&f, f.admin_id, f.prompt_one, "only prompt one got answers").await;
        locked_submission(&f, f.member_id, f.prompt_one, "same here").await;

        let outcome = f.service.compile(f.circle_id, "2026-03", compile_instant()).await.unwrap();
        let newsletter = match outcome {
            CompileOutcome::Compiled(n) => n,
            other => panic!("expected Compiled, got {other:?}"),
        };

        let sections = sections_of(&newsletter);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].prompt_title, "One Good Thing");
        assert_eq!(sections[0].responses.len(), 2);

        let unanswered = f.db.circles.find_prompt(f.prompt_two).await.unwrap().unwrap();
        assert!(sections.iter().all(|s| s.prompt_title != unanswered.text));
    }

    #[tokio::test]
    async fn test_member_name_falls_back_to_email() {
        let f = setup().await;
        locked_submission(&f, f.member_id, f.prompt_one, "no display name set").await;

        let outcome = f.service.compile(f.circle_id, "2026-03", compile_instant()).await.unwrap();
        let newsletter = match outcome {
            CompileOutcome::Compiled(n) => n,
            other => panic!("expected Compiled, got {other:?}"),
        };

        let sections = sections_of(&newsletter);
        assert_eq!(sections[0].responses[0].member_name, "grace@example.com");
    }

    #[tokio::test]
    async fn test_compile_is_idempotent() {
        let f = setup().await;
        locked_submission(&f, f.admin_id, f.prompt_one, "march entry").await;

        let first = f.service.compile(f.circle_id, "2026-03", compile_instant()).await.unwrap();
        let first = match first {
            CompileOutcome::Compiled(n) => n,
            other => panic!("expected Compiled, got {other:?}"),
        };

        let second = f.service.compile(f.circle_id, "2026-03", compile_instant()).await.unwrap();
        match second {
            CompileOutcome::AlreadyCompiled(existing) => assert_eq!(existing.id, first.id),
            other => panic!("expected AlreadyCompiled, got {other:?}"),
        }

        assert_eq!(f.db.newsletters.count_by_circle(f.circle_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_issue_numbers_increase_without_gaps() {
        let f = setup().await;

        for (cycle, instant) in [
            ("2026-01", Utc.with_ymd_and_hms(2026, 1, 10, 11, 0, 0).unwrap()),
            ("2026-02", Utc.with_ymd_and_hms(2026, 2, 14, 11, 0, 0).unwrap()),
            ("2026-03", compile_instant()),
        ] {
            let submission = f.db.submissions.create(f.admin_id, f.circle_id, cycle).await.unwrap();
            f.db.submissions.upsert_response(submission.id, f.prompt_one, "entry").await.unwrap();
            f.db.submissions.lock(submission.id, instant, true).await.unwrap();
            f.service.compile(f.circle_id, cycle, instant).await.unwrap();
        }

        let newsletters = f.db.newsletters.list_by_circle(f.circle_id).await.unwrap();
        let mut numbers: Vec<i32> = newsletters.iter().map(|n| n.issue_number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_title_and_counts() {
        let f = setup().await;
        locked_submission(&f, f.admin_id, f.prompt_one, "march entry").await;

        let outcome = f.service.compile(f.circle_id, "2026-03", compile_instant()).await.unwrap();
        let newsletter = match outcome {
            CompileOutcome::Compiled(n) => n,
            other => panic!("expected Compiled, got {other:?}"),
        };

        assert_eq!(newsletter.title, "Weekend Crew - March 2026");
        assert_eq!(newsletter.submission_count, 1);
        assert_eq!(newsletter.member_count, 2);
        assert!(newsletter.published_at.is_some());
    }
}
