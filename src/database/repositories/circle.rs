//! Circle and prompt repository

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::models::circle::{Circle, Prompt, CreateCircleRequest, UpdateCircleRequest, PromptInput};
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for circles and their prompts.
///
/// `invite_code` is unique across all circles; `find_by_invite_code`
/// returns at most one row.
#[async_trait]
pub trait CircleRepository: Send + Sync {
    /// Create a new circle
    async fn create(&self, request: CreateCircleRequest) -> Result<Circle, SecondSaturdayError>;

    /// Find circle by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Circle>, SecondSaturdayError>;

    /// Find circle by invite code
    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Circle>, SecondSaturdayError>;

    /// Update circle name/description
    async fn update(&self, id: i64, request: UpdateCircleRequest) -> Result<Circle, SecondSaturdayError>;

    /// Replace the invite code, invalidating all previously distributed links
    async fn set_invite_code(&self, id: i64, code: &str) -> Result<(), SecondSaturdayError>;

    /// Point the circle at a new admin user
    async fn set_admin(&self, id: i64, admin_id: i64) -> Result<(), SecondSaturdayError>;

    /// Archive the circle; terminal for invite acceptance
    async fn archive(&self, id: i64) -> Result<(), SecondSaturdayError>;

    /// All non-archived circles
    async fn list_active(&self) -> Result<Vec<Circle>, SecondSaturdayError>;

    /// Non-archived circles administered by the given user
    async fn list_admined_by(&self, user_id: i64) -> Result<Vec<Circle>, SecondSaturdayError>;

    /// Insert a single prompt
    async fn insert_prompt(&self, circle_id: i64, text: &str, position: i32) -> Result<Prompt, SecondSaturdayError>;

    /// Find prompt by ID
    async fn find_prompt(&self, id: i64) -> Result<Option<Prompt>, SecondSaturdayError>;

    /// Active prompts for a circle, ordered by position
    async fn list_active_prompts(&self, circle_id: i64) -> Result<Vec<Prompt>, SecondSaturdayError>;

    /// Deactivate the current prompt set and apply the replacement set
    /// as one atomic operation
    async fn replace_prompts(&self, circle_id: i64, prompts: Vec<PromptInput>) -> Result<(), SecondSaturdayError>;
}

#[derive(Debug, Clone)]
pub struct PgCircleRepository {
    pool: PgPool,
}

impl PgCircleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CircleRepository for PgCircleRepository {
    async fn create(&self, request: CreateCircleRequest) -> Result<Circle, SecondSaturdayError> {
        let circle = sqlx::query_as::<_, Circle>(
            r#"
            INSERT INTO circles (name, description, admin_id, invite_code, timezone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, description, admin_id, invite_code, timezone, archived_at, created_at, updated_at
            "#
        )
        .bind(request.name)
        .bind(request.description)
        .bind(request.admin_id)
        .bind(request.invite_code)
        .bind(request.timezone)
        .bind(Utc::now())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(circle)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Circle>, SecondSaturdayError> {
        let circle = sqlx::query_as::<_, Circle>(
            "SELECT id, name, description, admin_id, invite_code, timezone, archived_at, created_at, updated_at FROM circles WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(circle)
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Circle>, SecondSaturdayError> {
        let circle = sqlx::query_as::<_, Circle>(
            "SELECT id, name, description, admin_id, invite_code, timezone, archived_at, created_at, updated_at FROM circles WHERE invite_code = $1"
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(circle)
    }

    async fn update(&self, id: i64, request: UpdateCircleRequest) -> Result<Circle, SecondSaturdayError> {
        let circle = sqlx::query_as::<_, Circle>(
            r#"
            UPDATE circles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = $4
            WHERE id = $1
            RETURNING id, name, description, admin_id, invite_code, timezone, archived_at, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(circle)
    }

    async fn set_invite_code(&self, id: i64, code: &str) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE circles SET invite_code = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(code)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_admin(&self, id: i64, admin_id: i64) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE circles SET admin_id = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(admin_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn archive(&self, id: i64) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE circles SET archived_at = $2, updated_at = $2 WHERE id = $1 AND archived_at IS NULL")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Circle>, SecondSaturdayError> {
        let circles = sqlx::query_as::<_, Circle>(
            "SELECT id, name, description, admin_id, invite_code, timezone, archived_at, created_at, updated_at FROM circles WHERE archived_at IS NULL ORDER BY created_at ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(circles)
    }

    async fn list_admined_by(&self, user_id: i64) -> Result<Vec<Circle>, SecondSaturdayError> {
        let circles = sqlx::query_as::<_, Circle>(
            "SELECT id, name, description, admin_id, invite_code, timezone, archived_at, created_at, updated_at FROM circles WHERE admin_id = $1 AND archived_at IS NULL"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(circles)
    }

    async fn insert_prompt(&self, circle_id: i64, text: &str, position: i32) -> Result<Prompt, SecondSaturdayError> {
        let prompt = sqlx::query_as::<_, Prompt>(
            r#"
            INSERT INTO prompts (circle_id, text, position, active, created_at)
            VALUES ($1, $2, $3, true, $4)
            RETURNING id, circle_id, text, position, active, created_at
            "#
        )
        .bind(circle_id)
        .bind(text)
        .bind(position)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(prompt)
    }

    async fn find_prompt(&self, id: i64) -> Result<Option<Prompt>, SecondSaturdayError> {
        let prompt = sqlx::query_as::<_, Prompt>(
            "SELECT id, circle_id, text, position, active, created_at FROM prompts WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(prompt)
    }

    async fn list_active_prompts(&self, circle_id: i64) -> Result<Vec<Prompt>, SecondSaturdayError> {
        let prompts = sqlx::query_as::<_, Prompt>(
            "SELECT id, circle_id, text, position, active, created_at FROM prompts WHERE circle_id = $1 AND active = true ORDER BY position ASC"
        )
        .bind(circle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(prompts)
    }

    async fn replace_prompts(&self, circle_id: i64, prompts: Vec<PromptInput>) -> Result<(), SecondSaturdayError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE prompts SET active = false WHERE circle_id = $1")
            .bind(circle_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for prompt in prompts {
            match prompt.id {
                Some(id) => {
                    sqlx::query(
                        "UPDATE prompts SET text = $2, position = $3, active = true WHERE id = $1 AND circle_id = $4"
                    )
                    .bind(id)
                    .bind(prompt.text)
                    .bind(prompt.position)
                    .bind(circle_id)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO prompts (circle_id, text, position, active, created_at) VALUES ($1, $2, $3, true, $4)"
                    )
                    .bind(circle_id)
                    .bind(prompt.text)
                    .bind(prompt.position)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
