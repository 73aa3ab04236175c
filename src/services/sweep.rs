//! Weekly cycle sweep orchestration
//!
//! Three entry points, each taking the tick instant explicitly so schedules
//! can be replayed in tests: the Saturday lock sweep, the second-Saturday
//! compile-and-send sweep, and the Wednesday reminder sweep. Circles are
//! processed independently; one circle's failure never aborts its siblings.

use std::collections::HashMap;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn, error, debug};
use crate::database::DatabaseService;
use crate::models::circle::Circle;
use crate::services::cycle;
use crate::services::email::{EmailService, Recipient};
use crate::services::newsletter::{CompileOutcome, NewsletterService};
use crate::services::push::{PushNotification, PushService};
use crate::services::reminder::{self, ReminderService};
use crate::services::submission::SubmissionService;
use crate::utils::errors::Result;
use crate::utils::logging;

/// Outcome tally of one newsletter sweep tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub circles_processed: usize,
    pub compiled: usize,
    pub missed_months: usize,
    pub failures: usize,
}

/// Scheduled sweep orchestrator
#[derive(Clone)]
pub struct SweepService {
    db: DatabaseService,
    submissions: SubmissionService,
    newsletters: NewsletterService,
    reminders: ReminderService,
    email: EmailService,
    push: PushService,
}

impl SweepService {
    /// Create a new SweepService instance
    pub fn new(
        db: DatabaseService,
        submissions: SubmissionService,
        newsletters: NewsletterService,
        reminders: ReminderService,
        email: EmailService,
        push: PushService,
    ) -> Self {
        Self { db, submissions, newsletters, reminders, email, push }
    }

    /// Saturday deadline tick: lock every overdue draft
    pub async fn run_lock_sweep(&self, now: DateTime<Utc>) -> Result<u64> {
        info!(now = %now, "Running lock sweep");
        self.submissions.lock_past_deadline(now).await
    }

    /// Saturday compile tick. Gated to the second Saturday; compiles and
    /// dispatches every active circle independently.
    pub async fn run_newsletter_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        if !cycle::is_second_saturday(now) {
            debug!(now = %now, "Not the second Saturday, skipping newsletter sweep");
            return Ok(SweepReport::default());
        }

        let cycle_id = cycle::cycle_id_for(now);
        let circles = self.db.circles.list_active().await?;
        info!(circle_count = circles.len(), cycle_id = %cycle_id, "Running newsletter sweep");

        let mut report = SweepReport::default();
        for circle in circles {
            report.circles_processed += 1;
            let circle_id = circle.id;

            match self.process_circle(circle, &cycle_id, now).await {
                Ok(CompileOutcome::Compiled(_)) => {
                    report.compiled += 1;
                    logging::log_sweep_unit("newsletter", circle_id, true, None);
                }
                Ok(CompileOutcome::MissedMonth) => {
                    report.missed_months += 1;
                    logging::log_sweep_unit("newsletter", circle_id, true, Some("missed month"));
                }
                Ok(CompileOutcome::AlreadyCompiled(_)) => {
                    logging::log_sweep_unit("newsletter", circle_id, true, Some("already compiled"));
                }
                Err(e) => {
                    report.failures += 1;
                    error!(circle_id = circle_id, error = %e, "Newsletter sweep failed for circle");
                }
            }
        }

        info!(
            processed = report.circles_processed,
            compiled = report.compiled,
            missed = report.missed_months,
            failures = report.failures,
            "Newsletter sweep complete"
        );
        Ok(report)
    }

    /// Compile one circle's cycle, then dispatch whatever the outcome calls
    /// for. Notification transports run after the compile state committed.
    async fn process_circle(&self, circle: Circle, cycle_id: &str, now: DateTime<Utc>) -> Result<CompileOutcome> {
        let outcome = self.newsletters.compile(circle.id, cycle_id, now).await?;

        match &outcome {
            CompileOutcome::MissedMonth => {
                let recipients = self.active_recipients(circle.id).await?;
                self.email.send_missed_month(&circle, cycle_id, &recipients).await;
            }
            CompileOutcome::Compiled(newsletter) => {
                let recipients = self.active_recipients(circle.id).await?;
                let sent = self.email.send_newsletter(&circle, newsletter, &recipients).await;
                self.newsletters.record_recipient_count(newsletter.id, sent as i32).await?;

                self.notify_newsletter_ready(&circle).await?;

                let cleaned = self.db.reminders.delete_for_circle_cycle(circle.id, cycle_id).await?;
                if cleaned > 0 {
                    debug!(circle_id = circle.id, cleaned = cleaned, "Cleaned up admin reminders");
                }
            }
            CompileOutcome::AlreadyCompiled(_) => {}
        }

        Ok(outcome)
    }

    /// Wednesday reminder tick. Fires only when the coming Saturday is the
    /// second Saturday; pushes to non-submitters who have not opted out.
    pub async fn run_reminder_sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let coming_saturday = now + Duration::days(3);
        if !cycle::is_second_saturday(coming_saturday) {
            debug!(now = %now, "Coming Saturday is not the second Saturday, skipping reminders");
            return Ok(0);
        }

        let cycle_id = cycle::cycle_id_for(now);
        let circles = self.db.circles.list_active().await?;
        info!(circle_count = circles.len(), cycle_id = %cycle_id, "Running reminder sweep");

        let mut notified_total = 0;
        for circle in circles {
            match self.remind_circle(&circle, &cycle_id).await {
                Ok(notified) => {
                    notified_total += notified;
                    if notified > 0 {
                        info!(circle_id = circle.id, notified = notified, "Submission reminders sent");
                    }
                }
                Err(e) => {
                    warn!(circle_id = circle.id, error = %e, "Reminder sweep failed for circle");
                }
            }
        }

        Ok(notified_total)
    }

    async fn remind_circle(&self, circle: &Circle, cycle_id: &str) -> Result<usize> {
        let memberships = self.db.memberships.list_by_circle(circle.id).await?;
        let submissions = self.db.submissions.list_by_circle_cycle(circle.id, cycle_id).await?;
        let pending = reminder::non_submitters(&memberships, &submissions, cycle_id);

        let mut player_ids = Vec::new();
        for membership in pending {
            if !self
                .reminders
                .resolve_preferences(membership.user_id)
                .await?
                .submission_reminders
            {
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
            self.push
                .dispatch(PushNotification {
                    player_ids,
                    title: "Submission Reminder".to_string(),
                    message: format!("Don't forget to submit to {} before Saturday's deadline!", circle.name),
                    data: HashMap::from([
                        ("type".to_string(), "submission_reminder".to_string()),
                        ("circle_id".to_string(), circle.id.to_string()),
                    ]),
                })
                .await;
        }

        Ok(notified)
    }

    async fn notify_newsletter_ready(&self, circle: &Circle) -> Result<()> {
        let memberships = self.db.memberships.list_by_circle(circle.id).await?;
        let mut player_ids = Vec::new();

        for membership in memberships.iter().filter(|m| m.is_active() && !m.blocked) {
            if !self
                .reminders
                .resolve_preferences(membership.user_id)
                .await?
                .newsletter_ready
            {
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

        if !player_ids.is_empty() {
            self.push
                .dispatch(PushNotification {
                    player_ids,
                    title: "Newsletter Ready!".to_string(),
                    message: format!("The latest {} newsletter is ready to read!", circle.name),
                    data: HashMap::from([
                        ("type".to_string(), "newsletter_ready".to_string()),
                        ("circle_id".to_string(), circle.id.to_string()),
                    ]),
                })
                .await;
        }

        Ok(())
    }

    /// Active, non-blocked members with a resolvable email address
    async fn active_recipients(&self, circle_id: i64) -> Result<Vec<Recipient>> {
        let memberships = self.db.memberships.list_by_circle(circle_id).await?;
        let mut recipients = Vec::new();

        for membership in memberships.iter().filter(|m| m.is_active() && !m.blocked) {
            if let Some(user) = self.db.users.find_by_id(membership.user_id).await? {
                if !user.email.is_empty() {
                    recipients.push(Recipient { email: user.email, name: user.name });
                }
            }
        }

        Ok(recipients)
    }
}
