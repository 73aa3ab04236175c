//! Membership repository

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::models::Membership;
use crate::utils::errors::SecondSaturdayError;

/// Persistence contract for memberships.
///
/// At most one row exists per (user, circle); `find_by_user_circle` returns
/// that row whether active, left, or blocked. Rejoining reactivates the
/// historical row instead of inserting a second one.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a fresh membership row
    async fn insert(&self, user_id: i64, circle_id: i64, role: &str) -> Result<Membership, SecondSaturdayError>;

    /// Find the single membership row for a (user, circle) pair
    async fn find_by_user_circle(&self, user_id: i64, circle_id: i64) -> Result<Option<Membership>, SecondSaturdayError>;

    /// All membership rows of a circle, including left and blocked ones
    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Membership>, SecondSaturdayError>;

    /// All membership rows of a user
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Membership>, SecondSaturdayError>;

    /// Clear `left_at` and reset `joined_at` on a historical row
    async fn reactivate(&self, id: i64) -> Result<Membership, SecondSaturdayError>;

    /// Mark the membership as left
    async fn set_left(&self, id: i64) -> Result<(), SecondSaturdayError>;

    /// Mark the membership as left and blocked; blocking is terminal
    async fn set_left_and_blocked(&self, id: i64) -> Result<(), SecondSaturdayError>;

    /// Change the member's role
    async fn set_role(&self, id: i64, role: &str) -> Result<(), SecondSaturdayError>;

    /// Mark every active membership of a user as left (account deletion)
    async fn mark_all_left_for_user(&self, user_id: i64) -> Result<u64, SecondSaturdayError>;
}

const MEMBERSHIP_COLUMNS: &str = "id, user_id, circle_id, role, joined_at, left_at, blocked";

#[derive(Debug, Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn insert(&self, user_id: i64, circle_id: i64, role: &str) -> Result<Membership, SecondSaturdayError> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (user_id, circle_id, role, joined_at, blocked)
            VALUES ($1, $2, $3, $4, false)
            RETURNING id, user_id, circle_id, role, joined_at, left_at, blocked
            "#
        )
        .bind(user_id)
        .bind(circle_id)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn find_by_user_circle(&self, user_id: i64, circle_id: i64) -> Result<Option<Membership>, SecondSaturdayError> {
        let membership = sqlx::query_as::<_, Membership>(
            &format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = $1 AND circle_id = $2")
        )
        .bind(user_id)
        .bind(circle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn list_by_circle(&self, circle_id: i64) -> Result<Vec<Membership>, SecondSaturdayError> {
        let memberships = sqlx::query_as::<_, Membership>(
            &format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE circle_id = $1 ORDER BY joined_at ASC")
        )
        .bind(circle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Membership>, SecondSaturdayError> {
        let memberships = sqlx::query_as::<_, Membership>(
            &format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = $1 ORDER BY joined_at ASC")
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    async fn reactivate(&self, id: i64) -> Result<Membership, SecondSaturdayError> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET left_at = NULL, joined_at = $2, role = 'member'
            WHERE id = $1
            RETURNING id, user_id, circle_id, role, joined_at, left_at, blocked
            "#
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn set_left(&self, id: i64) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE memberships SET left_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_left_and_blocked(&self, id: i64) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE memberships SET left_at = $2, blocked = true WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_role(&self, id: i64, role: &str) -> Result<(), SecondSaturdayError> {
        sqlx::query("UPDATE memberships SET role = $2 WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_all_left_for_user(&self, user_id: i64) -> Result<u64, SecondSaturdayError> {
        let result = sqlx::query("UPDATE memberships SET left_at = $2 WHERE user_id = $1 AND left_at IS NULL")
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
