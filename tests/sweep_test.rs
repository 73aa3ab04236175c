//! Sweep orchestration scenarios: second-Saturday gating, outbound email
//! dispatch with recipient tallies, reminder-day gating, and per-circle
//! failure isolation.

mod helpers;

use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::TestContext;
use SecondSaturday::database::repositories::NewsletterRepository;
use SecondSaturday::models::newsletter::{CreateNewsletterRequest, Newsletter};
use SecondSaturday::services::ServiceFactory;
use SecondSaturday::SecondSaturdayError;

fn second_saturday_tick() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 0).unwrap()
}

fn first_saturday_tick() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 7, 11, 0, 0).unwrap()
}

/// Wednesday three days before the second Saturday of March 2026
fn reminder_wednesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 11, 0, 0).unwrap()
}

async fn seed_locked_submission(ctx: &TestContext, user_id: i64, circle_id: i64, prompt_id: i64) {
    ctx.services
        .submission_service
        .save_draft(user_id, circle_id, "2026-03", prompt_id, "an entry")
        .await
        .unwrap();
    let submission = ctx
        .db
        .submissions
        .find_by_user_circle_cycle(user_id, circle_id, "2026-03")
        .await
        .unwrap()
        .unwrap();
    ctx.services
        .submission_service
        .lock_submission(user_id, submission.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn newsletter_sweep_skips_outside_second_saturday() {
    let ctx = TestContext::new();
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let (circle, prompt_id) = ctx.circle_with_admin("Weekend Crew", &ada).await;
    seed_locked_submission(&ctx, ada.id, circle.id, prompt_id).await;

    let report = ctx
        .services
        .sweep_service
        .run_newsletter_sweep(first_saturday_tick())
        .await
        .unwrap();
    assert_eq!(report.circles_processed, 0);

    assert!(ctx
        .db
        .newsletters
        .find_by_circle_cycle(circle.id, "2026-03")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn newsletter_sweep_sends_and_records_recipients() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ctx = TestContext::with_transport_url(&server.uri());
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let grace = ctx.user("subj-grace", Some("Grace")).await;
    let (circle, prompt_id) = ctx.circle_with_admin("Weekend Crew", &ada).await;
    ctx.add_member(&circle, &grace).await;
    seed_locked_submission(&ctx, ada.id, circle.id, prompt_id).await;

    // a stale admin reminder that the successful send should clean up
    ctx.db
        .reminders
        .insert(circle.id, ada.id, None, "2026-03")
        .await
        .unwrap();

    let report = ctx
        .services
        .sweep_service
        .run_newsletter_sweep(second_saturday_tick())
        .await
        .unwrap();
    assert_eq!(report.circles_processed, 1);
    assert_eq!(report.compiled, 1);
    assert_eq!(report.failures, 0);

    let newsletter = ctx
        .db
        .newsletters
        .find_by_circle_cycle(circle.id, "2026-03")
        .await
        .unwrap()
        .unwrap();
    // both active members were reachable by email
    assert_eq!(newsletter.recipient_count, Some(2));

    // reminder rows for the cycle are gone after the send
    assert_eq!(
        ctx.db.reminders.count_for(ada.id, circle.id, "2026-03").await.unwrap(),
        0
    );

    let email_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/emails")
        .count();
    assert_eq!(email_requests, 2);
}

#[tokio::test]
async fn missed_month_creates_no_newsletter_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ctx = TestContext::with_transport_url(&server.uri());
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let (circle, _) = ctx.circle_with_admin("Weekend Crew", &ada).await;

    let report = ctx
        .services
        .sweep_service
        .run_newsletter_sweep(second_saturday_tick())
        .await
        .unwrap();
    assert_eq!(report.missed_months, 1);
    assert_eq!(report.compiled, 0);

    assert!(ctx
        .db
        .newsletters
        .find_by_circle_cycle(circle.id, "2026-03")
        .await
        .unwrap()
        .is_none());

    // the missed-month notice still went out
    let email_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/emails")
        .count();
    assert_eq!(email_requests, 1);
}

#[tokio::test]
async fn rerunning_the_sweep_mints_no_second_issue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ctx = TestContext::with_transport_url(&server.uri());
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let (circle, prompt_id) = ctx.circle_with_admin("Weekend Crew", &ada).await;
    seed_locked_submission(&ctx, ada.id, circle.id, prompt_id).await;

    let sweeps = &ctx.services.sweep_service;
    let first = sweeps.run_newsletter_sweep(second_saturday_tick()).await.unwrap();
    assert_eq!(first.compiled, 1);

    let second = sweeps.run_newsletter_sweep(second_saturday_tick()).await.unwrap();
    assert_eq!(second.compiled, 0);
    assert_eq!(second.failures, 0);

    let newsletters = ctx.db.newsletters.list_by_circle(circle.id).await.unwrap();
    assert_eq!(newsletters.len(), 1);
}

#[tokio::test]
async fn reminder_sweep_gates_on_coming_saturday() {
    let ctx = TestContext::new();
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let grace = ctx.user("subj-grace", Some("Grace")).await;
    let (circle, _) = ctx.circle_with_admin("Weekend Crew", &ada).await;
    ctx.add_member(&circle, &grace).await;
    ctx.db.users.set_push_player_id(grace.id, "player-grace").await.unwrap();

    // a Wednesday whose coming Saturday is the FIRST Saturday: no reminders
    let early_wednesday = Utc.with_ymd_and_hms(2026, 3, 4, 11, 0, 0).unwrap();
    let notified = ctx.services.sweep_service.run_reminder_sweep(early_wednesday).await.unwrap();
    assert_eq!(notified, 0);

    // the Wednesday before the second Saturday reaches the non-submitter
    let notified = ctx
        .services
        .sweep_service
        .run_reminder_sweep(reminder_wednesday())
        .await
        .unwrap();
    assert_eq!(notified, 1);
}

#[tokio::test]
async fn reminder_sweep_honors_opt_out() {
    let ctx = TestContext::new();
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let grace = ctx.user("subj-grace", Some("Grace")).await;
    let (circle, _) = ctx.circle_with_admin("Weekend Crew", &ada).await;
    ctx.add_member(&circle, &grace).await;
    ctx.db.users.set_push_player_id(grace.id, "player-grace").await.unwrap();

    ctx.services
        .reminder_service
        .update_preferences(grace.id, false, true)
        .await
        .unwrap();

    let notified = ctx
        .services
        .sweep_service
        .run_reminder_sweep(reminder_wednesday())
        .await
        .unwrap();
    assert_eq!(notified, 0);
}

/// Newsletter repository that fails inserts for one poisoned circle,
/// delegating everything else to the in-memory implementation.
struct PoisonedNewsletterRepository {
    inner: Arc<dyn NewsletterRepository>,
    poisoned_circle_id: i64,
}

#[async_trait]
impl NewsletterRepository for PoisonedNewsletterRepository {
    async fn insert(&self, request: CreateNewsletterRequest) -> Result<Newsletter, SecondSaturdayError> {
        if request.circle_id == self.poisoned_circle_id {
            return Err(SecondSaturdayError::ServiceUnavailable("simulated outage".to_string()));
        }
        self.inner.insert(request).await
    }

    async fn find_by_circle_cycle(&self, circle_id: i64, cycle_id: &str) -> Result<Option<Newsletter>, SecondSaturdayError> {
        self.inner.find_by_circle_cycle(circle_id, cycle_id).await
    }

    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Newsletter>, SecondSaturdayError> {
        self.inner.list_by_circle(circle_id).await
    }

    async fn count_by_circle(&self, circle_id: i64) -> Result<i64, SecondSaturdayError> {
        self.inner.count_by_circle(circle_id).await
    }

    async fn set_recipient_count(&self, id: i64, count: i32) -> Result<(), SecondSaturdayError> {
        self.inner.set_recipient_count(id, count).await
    }
}

#[tokio::test]
async fn one_failing_circle_does_not_abort_the_sweep() {
    let ctx = TestContext::new();
    let ada = ctx.user("subj-ada", Some("Ada")).await;
    let grace = ctx.user("subj-grace", Some("Grace")).await;

    let (poisoned, poisoned_prompt) = ctx.circle_with_admin("Doomed Circle", &ada).await;
    let (healthy, healthy_prompt) = ctx.circle_with_admin("Healthy Circle", &grace).await;
    seed_locked_submission(&ctx, ada.id, poisoned.id, poisoned_prompt).await;
    seed_locked_submission(&ctx, grace.id, healthy.id, healthy_prompt).await;

    // rebuild the stack with the poisoned repository in place
    let mut db = ctx.db.clone();
    db.newsletters = Arc::new(PoisonedNewsletterRepository {
        inner: db.newsletters.clone(),
        poisoned_circle_id: poisoned.id,
    });
    let services = ServiceFactory::new(db.clone(), helpers::test_settings("http://127.0.0.1:1")).unwrap();

    let report = services
        .sweep_service
        .run_newsletter_sweep(second_saturday_tick())
        .await
        .unwrap();

    assert_eq!(report.circles_processed, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(report.compiled, 1);

    // the healthy circle got its issue despite the sibling failure
    assert!(db.newsletters.find_by_circle_cycle(healthy.id, "2026-03").await.unwrap().is_some());
    assert!(db.newsletters.find_by_circle_cycle(poisoned.id, "2026-03").await.unwrap().is_none());
}
