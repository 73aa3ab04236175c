//! Second Saturday service
//!
//! Main application entry point: wires configuration, logging, the database
//! and the service layer, then drives the three weekly sweep triggers.

use chrono::{Datelike, Timelike, Utc, Weekday};
use tracing::{info, error};

use SecondSaturday::{
    config::Settings,
    database::{self, DatabaseService},
    services::{ServiceFactory, SweepService},
    utils::logging,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging
    logging::init_logging(&settings.logging)?;

    info!("Starting Second Saturday service...");

    // Initialize database connection
    info!("Connecting to database...");
    let db_config = database::connection::DatabaseConfig {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        min_connections: settings.database.min_connections,
        acquire_timeout: std::time::Duration::from_secs(30),
        idle_timeout: Some(std::time::Duration::from_secs(600)),
        max_lifetime: Some(std::time::Duration::from_secs(1800)),
    };
    let db_pool = database::create_pool(&db_config).await?;

    // Run database migrations
    database::run_migrations(&db_pool).await?;

    // Initialize repositories and services
    info!("Initializing services...");
    let database_service = DatabaseService::postgres(db_pool);
    let services = ServiceFactory::new(database_service, settings)?;

    info!("Second Saturday service is ready");

    run_scheduler(services.sweep_service).await;

    info!("Second Saturday service has been shut down.");
    Ok(())
}

/// One weekly trigger: fires when the UTC minute matches
struct Trigger {
    name: &'static str,
    weekday: Weekday,
    hour: u32,
    minute: u32,
    last_fired: Option<String>,
}

impl Trigger {
    fn new(name: &'static str, weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self { name, weekday, hour, minute, last_fired: None }
    }

    /// Returns true at most once per matching minute
    fn due(&mut self, now: chrono::DateTime<Utc>) -> bool {
        if now.weekday() != self.weekday || now.hour() != self.hour || now.minute() != self.minute {
            return false;
        }
        let key = now.format("%Y-%m-%d %H:%M").to_string();
        if self.last_fired.as_deref() == Some(key.as_str()) {
            return false;
        }
        self.last_fired = Some(key);
        true
    }
}

/// Drive the three weekly sweep triggers off the wall clock. The sweeps gate
/// themselves (second Saturday, coming Saturday) from the instant passed in,
/// so the scheduler only supplies the weekly ticks.
async fn run_scheduler(sweeps: SweepService) {
    // Saturday 10:59 UTC: deadline lock sweep
    let mut lock_trigger = Trigger::new("lock", Weekday::Sat, 10, 59);
    // Saturday 11:00 UTC: compile and send (second Saturday only)
    let mut newsletter_trigger = Trigger::new("newsletter", Weekday::Sat, 11, 0);
    // Wednesday 11:00 UTC: submission reminders (before the second Saturday only)
    let mut reminder_trigger = Trigger::new("reminder", Weekday::Wed, 11, 0);

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(20));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Scheduler running");
    loop {
        ticker.tick().await;
        let now = Utc::now();

        if lock_trigger.due(now) {
            info!(trigger = lock_trigger.name, "Trigger fired");
            match sweeps.run_lock_sweep(now).await {
                Ok(locked) => info!(locked = locked, "Lock sweep finished"),
                Err(e) => error!(error = %e, "Lock sweep failed"),
            }
        }

        if newsletter_trigger.due(now) {
            info!(trigger = newsletter_trigger.name, "Trigger fired");
            match sweeps.run_newsletter_sweep(now).await {
                Ok(report) => info!(
                    compiled = report.compiled,
                    missed = report.missed_months,
                    failures = report.failures,
                    "Newsletter sweep finished"
                ),
                Err(e) => error!(error = %e, "Newsletter sweep failed"),
            }
        }

        if reminder_trigger.due(now) {
            info!(trigger = reminder_trigger.name, "Trigger fired");
            match sweeps.run_reminder_sweep(now).await {
                Ok(notified) => info!(notified = notified, "Reminder sweep finished"),
                Err(e) => error!(error = %e, "Reminder sweep failed"),
            }
        }
    }
}
