//! Authentication service
//!
//! Resolves an opaque bearer token from the identity provider to a stable
//! subject and maps it to a local user row. Mutation paths use the
//! auto-creating variant so a first sign-in event materializes the user.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;
use crate::config::AuthConfig;
use crate::database::DatabaseService;
use crate::models::user::{CreateUserRequest, User};
use crate::utils::errors::{SecondSaturdayError, Result};

/// Claims carried by the identity provider's session token
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub exp: usize,
}

/// Authentication service mapping tokens to users
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseService,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: DatabaseService, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Verify the token and return its claims
    pub fn resolve_claims(&self, token: &str) -> Result<IdentityClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<IdentityClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| SecondSaturdayError::NotAuthenticated)?;

        Ok(data.claims)
    }

    /// Resolve the caller to an existing user; fails when the subject has no
    /// user row yet
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.resolve_claims(token)?;
        debug!(subject = %claims.sub, "Authenticating caller");

        self.db
            .users
            .find_by_subject(&claims.sub)
            .await?
            .ok_or(SecondSaturdayError::SubjectNotRegistered)
    }

    /// Resolve the caller, creating the user row on first sign-in
    pub async fn authenticate_or_create(&self, token: &str) -> Result<User> {
        let claims = self.resolve_claims(token)?;

        if let Some(user) = self.db.users.find_by_subject(&claims.sub).await? {
            return Ok(user);
        }

        debug!(subject = %claims.sub, "First sign-in, creating user");
        self.db
            .users
            .create(CreateUserRequest {
                subject: claims.sub,
                email: claims.email.unwrap_or_default(),
                name: claims.name,
                image_url: claims.picture,
            })
            .await
    }
}
