//! Email transport service
//!
//! Renders newsletter and missed-month HTML bodies and sends them through
//! the transactional email provider's `{to, subject, html}` API. A failed
//! send for one recipient never aborts the rest of the batch; the final
//! tally of successful sends is reported back to the caller.

use std::time::Duration;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn, debug};
use crate::config::EmailConfig;
use crate::models::circle::Circle;
use crate::models::newsletter::{Newsletter, NewsletterSection};
use crate::services::cycle;
use crate::utils::errors::{SecondSaturdayError, Result};

/// A newsletter recipient with a resolved email address
#[derive(Debug, Clone)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Email transport client
#[derive(Debug, Clone)]
pub struct EmailService {
    client: Client,
    config: EmailConfig,
}

impl EmailService {
    /// Create a new EmailService instance
    pub fn new(config: EmailConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("SecondSaturday/1.0")
            .build()
            .map_err(SecondSaturdayError::Http)?;

        Ok(Self { client, config })
    }

    /// Send one email; non-2xx responses are errors
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let request = SendRequest {
            from: &self.config.from_address,
            to: [to],
            subject,
            html,
        };

        let url = format!("{}/emails", self.config.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SecondSaturdayError::ServiceUnavailable(format!(
                "email provider returned {}",
                response.status()
            )));
        }

        debug!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }

    /// Send a compiled newsletter to every recipient, counting successes
    pub async fn send_newsletter(&self, circle: &Circle, newsletter: &Newsletter, recipients: &[Recipient]) -> usize {
        let subject = format!("{} - Issue #{}", circle.name, newsletter.issue_number);
        let html = self.render_newsletter_html(circle, newsletter);

        let mut sent_count = 0;
        for recipient in recipients {
            match self.send(&recipient.email, &subject, &html).await {
                Ok(()) => sent_count += 1,
                Err(e) => {
                    warn!(to = %recipient.email, error = %e, "Failed to send newsletter email");
                }
            }
        }

        info!(
            newsletter_id = newsletter.id,
            sent = sent_count,
            total = recipients.len(),
            "Newsletter send completed"
        );
        sent_count
    }

    /// Send the missed-month notice for a cycle with zero locked submissions
    pub async fn send_missed_month(&self, circle: &Circle, cycle_id: &str, recipients: &[Recipient]) -> usize {
        let subject = format!("No submissions this month for {}", circle.name);
        let html = self.render_missed_month_html(circle, cycle_id);

        let mut sent_count = 0;
        for recipient in recipients {
            match self.send(&recipient.email, &subject, &html).await {
                Ok(()) => sent_count += 1,
                Err(e) => {
                    warn!(to = %recipient.email, error = %e, "Failed to send missed-month email");
                }
            }
        }

        info!(circle_id = circle.id, sent = sent_count, total = recipients.len(), "Missed-month send completed");
        sent_count
    }

    /// Render the issue body from the newsletter's serialized sections
    fn render_newsletter_html(&self, circle: &Circle, newsletter: &Newsletter) -> String {
        let sections: Vec<NewsletterSection> = newsletter
            .sections
            .get("sections")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        let mut body = String::new();
        body.push_str(&format!(
            "<h1>{}</h1><h2>Issue #{} &mdash; {}</h2>",
            circle.name,
            newsletter.issue_number,
            cycle_title(&newsletter.cycle_id),
        ));

        for section in &sections {
            body.push_str(&format!("<h3>{}</h3>", section.prompt_title));
            for response in &section.responses {
                body.push_str(&format!(
                    "<p><strong>{}</strong>: {}</p>",
                    response.member_name, response.text
                ));
                for media in &response.media {
                    body.push_str(&format!("<p><img src=\"{}\" alt=\"\" /></p>", media.url));
                }
            }
        }

        let view_url = format!(
            "{}/circles/{}/newsletters/{}",
            self.config.app_url, newsletter.circle_id, newsletter.id
        );
        let unsubscribe_url = format!("{}/circles/{}/unsubscribe", self.config.app_url, newsletter.circle_id);
        body.push_str(&format!(
            "<p><a href=\"{view_url}\">View in app</a> &middot; <a href=\"{unsubscribe_url}\">Unsubscribe</a></p>"
        ));

        body
    }

    /// Render the missed-month body, naming the next cycle's deadline
    fn render_missed_month_html(&self, circle: &Circle, cycle_id: &str) -> String {
        let next_deadline = cycle::next_deadline_after(cycle_id)
            .map(|deadline| {
                format!(
                    "{} {}, {}",
                    cycle::month_name(chrono::Datelike::month(&deadline)),
                    chrono::Datelike::day(&deadline),
                    chrono::Datelike::year(&deadline),
                )
            })
            .unwrap_or_else(|_| "next month".to_string());

        let view_url = format!("{}/circles/{}", self.config.app_url, circle.id);
        format!(
            "<h1>{}</h1><p>Nobody submitted this month, so there is no issue to share.</p>\
             <p>The next deadline is <strong>{next_deadline}</strong>.</p>\
             <p><a href=\"{view_url}\">Open your circle</a></p>",
            circle.name
        )
    }
}

fn cycle_title(cycle_id: &str) -> String {
    match cycle::parse_cycle_id(cycle_id) {
        Ok((year, month)) => format!("{} {}", cycle::month_name(month), year),
        Err(_) => cycle_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn service() -> EmailService {
        EmailService::new(EmailConfig {
            api_url: "https://api.example.com".to_string(),
            api_key: "key".to_string(),
            from_address: "noreply@secondsaturday.app".to_string(),
            app_url: "https://secondsaturday.app".to_string(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn circle() -> Circle {
        Circle {
            id: 7,
            name: "Weekend Crew".to_string(),
            description: None,
            admin_id: 1,
            invite_code: "code".to_string(),
            timezone: "UTC".to_string(),
            archived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_newsletter_html_includes_sections() {
        let newsletter = Newsletter {
            id: 42,
            circle_id: 7,
            cycle_id: "2026-03".to_string(),
            title: "Weekend Crew - March 2026".to_string(),
            issue_number: 3,
            sections: json!({
                "sections": [{
                    "prompt_title": "One Good Thing",
                    "responses": [{
                        "member_name": "Ada",
                        "text": "Shipped the compiler",
                        "media": []
                    }]
                }]
            }),
            submission_count: 1,
            member_count: 4,
            recipient_count: None,
            status: "published".to_string(),
            published_at: Some(Utc::now()),
            created_at: Utc::now(),
        };

        let html = service().render_newsletter_html(&circle(), &newsletter);
        assert!(html.contains("Issue #3"));
        assert!(html.contains("March 2026"));
        assert!(html.contains("One Good Thing"));
        assert!(html.contains("Ada"));
        assert!(html.contains("/circles/7/unsubscribe"));
    }

    #[test]
    fn test_render_missed_month_names_next_deadline() {
        let html = service().render_missed_month_html(&circle(), "2025-12");
        // next deadline after cycle 2025-12 is January 10, 2026
        assert!(html.contains("January 10, 2026"));
    }
}
