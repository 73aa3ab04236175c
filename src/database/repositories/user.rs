//! User repository

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::models::user::{User, CreateUserRequest, UpdateUserRequest};
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for users.
///
/// `subject` is the external identity id and is unique; `find_by_subject`
/// returns at most one row.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, request: CreateUserRequest) -> Result<User, SecondSaturdayError>;

    /// Create a user on first sign-in, or refresh profile fields on
    /// subsequent sign-in events for the same subject
    async fn upsert_by_subject(&self, request: CreateUserRequest) -> Result<User, SecondSaturdayError>;

    /// Find user by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, SecondSaturdayError>;

    /// Find user by external identity subject
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, SecondSaturdayError>;

    /// Update user profile fields
    async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, SecondSaturdayError>;

    /// Register the push provider player id for a user
    async fn set_push_player_id(&self, id: i64, player_id: &str) -> Result<(), SecondSaturdayError>;

    /// Delete user
    async fn delete(&self, id: i64) -> Result<(), SecondSaturdayError>;
}

const USER_COLUMNS: &str = "id, subject, email, name, image_url, avatar_storage_id, timezone, push_player_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User, SecondSaturdayError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (subject, email, name, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, subject, email, name, image_url, avatar_storage_id, timezone, push_player_id, created_at, updated_at
            "#
        )
        .bind(request.subject)
        .bind(request.email)
        .bind(request.name)
        .bind(request.image_url)
        .bind(Utc::now())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn upsert_by_subject(&self, request: CreateUserRequest) -> Result<User, SecondSaturdayError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (subject, email, name, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (subject) DO UPDATE
            SET email = EXCLUDED.email,
                name = EXCLUDED.name,
                image_url = EXCLUDED.image_url,
                updated_at = EXCLUDED.updated_at
            RETURNING id, subject, email, name, image_url, avatar_storage_id, timezone, push_player_id, created_at, updated_at
            "#
        )
        .bind(request.subject)
        .bind(request.email)
        .bind(request.name)
        .bind(request.image_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, SecondSaturdayError> {
        let user = sqlx::query_as::<_, User>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1")
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, SecondSaturdayError> {
        let user = sqlx::query_as::<_, User>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE subject = $1")
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, SecondSaturdayError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                image_url = COALESCE($4, image_url),
                avatar_storage_id = COALESCE($5, avatar_storage_id),
                timezone = COALESCE($6, timezone),
                updated_at = $7
            WHERE id = $1
            RETURNING id, subject, email, name, image_url, avatar_storage_id, timezone, push_player_id, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.email)
        .bind(request.name)
        .bind(request.image_url)
        .bind(request.avatar_storage_id)
        .bind(request.timezone)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_push_player_id(&self, id: i64, player_id: &str) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE users SET push_player_id = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(player_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), SecondSaturdayError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
