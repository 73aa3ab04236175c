//! Test helpers module
//!
//! Builds a full service stack over the in-memory store, with transport
//! endpoints that can be pointed at a wiremock server when a test needs to
//! observe outbound traffic.

use SecondSaturday::config::Settings;
use SecondSaturday::database::DatabaseService;
use SecondSaturday::models::circle::Circle;
use SecondSaturday::models::membership::{ROLE_ADMIN, ROLE_MEMBER};
use SecondSaturday::models::user::{CreateUserRequest, User};
use SecondSaturday::services::ServiceFactory;

/// A service stack wired to the in-memory store
pub struct TestContext {
    pub db: DatabaseService,
    pub services: ServiceFactory,
}

impl TestContext {
    /// Stack with unreachable transport endpoints; outbound dispatch fails
    /// fast and is swallowed by the services under test
    pub fn new() -> Self {
        Self::with_settings(test_settings("http://127.0.0.1:1"))
    }

    /// Stack whose email/push/storage clients talk to the given base URL
    pub fn with_transport_url(base_url: &str) -> Self {
        Self::with_settings(test_settings(base_url))
    }

    pub fn with_settings(settings: Settings) -> Self {
        let db = DatabaseService::in_memory();
        let services = ServiceFactory::new(db.clone(), settings).expect("service factory");
        Self { db, services }
    }

    /// Create a user with a unique subject
    pub async fn user(&self, subject: &str, name: Option<&str>) -> User {
        self.db
            .users
            .create(CreateUserRequest {
                subject: subject.to_string(),
                email: format!("{subject}@example.com"),
                name: name.map(|n| n.to_string()),
                image_url: None,
            })
            .await
            .expect("create user")
    }

    /// Create a circle with an admin membership and one seeded prompt,
    /// returning the circle and the prompt id
    pub async fn circle_with_admin(&self, name: &str, admin: &User) -> (Circle, i64) {
        let circle = self
            .services
            .circle_service
            .create_circle(admin.id, name, None, "UTC")
            .await
            .expect("create circle");
        let prompts = self
            .db
            .circles
            .list_active_prompts(circle.id)
            .await
            .expect("list prompts");
        (circle, prompts[0].id)
    }

    /// Add a user to a circle as a plain member
    pub async fn add_member(&self, circle: &Circle, user: &User) {
        self.db
            .memberships
            .insert(user.id, circle.id, ROLE_MEMBER)
            .await
            .expect("insert membership");
    }

    /// Register an admin membership directly (for fixtures that bypass
    /// CircleService)
    pub async fn add_admin(&self, circle_id: i64, user: &User) {
        self.db
            .memberships
            .insert(user.id, circle_id, ROLE_ADMIN)
            .await
            .expect("insert admin membership");
    }
}

pub fn test_settings(transport_url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.auth.jwt_secret = "test-secret".to_string();
    settings.webhook.signing_secret = "whsec-test".to_string();
    settings.email.api_url = transport_url.to_string();
    settings.email.timeout_seconds = 2;
    settings.push.api_url = transport_url.to_string();
    settings.push.app_id = "test-app".to_string();
    settings.push.api_key = "test-key".to_string();
    settings.push.timeout_seconds = 2;
    settings.storage.api_url = transport_url.to_string();
    settings.storage.timeout_seconds = 2;
    settings
}
