//! Credential store: registration, login and token authentication

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::Utc;
use common::StoreError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    jwt::JwtService,
    models::{PublicUser, User},
    repositories::UserRepository,
    validation::{validate_email, validate_password},
};

/// Issued token and the user it was issued for
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub user: PublicUser,
}

/// Credential failures
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    UnknownUser,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Validation(msg) => ApiError::Validation(msg),
            CredentialError::Conflict => ApiError::Conflict(err.to_string()),
            CredentialError::InvalidCredentials
            | CredentialError::InvalidToken
            | CredentialError::UnknownUser => ApiError::Unauthorized(err.to_string()),
            CredentialError::Internal(source) => ApiError::Internal(source),
        }
    }
}

impl From<StoreError> for CredentialError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => CredentialError::Conflict,
            other => CredentialError::Internal(other.into()),
        }
    }
}

/// Credential service
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserRepository>,
    jwt_service: JwtService,
}

impl CredentialService {
    /// Create a new credential service
    pub fn new(users: Arc<dyn UserRepository>, jwt_service: JwtService) -> Self {
        Self { users, jwt_service }
    }

    /// Register a new user and issue a token
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession, CredentialError> {
        validate_email(email).map_err(CredentialError::Validation)?;
        validate_password(password).map_err(CredentialError::Validation)?;

        if self.users.find_by_email(email).await?.is_some() {
            warn!("Registration rejected, email already in use");
            return Err(CredentialError::Conflict);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        let user = self.users.insert(user).await?;
        info!("Registered user {}", user.id);

        self.issue(&user)
    }

    /// Check credentials and issue a token
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, CredentialError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!("Login failed: unknown email");
            return Err(CredentialError::InvalidCredentials);
        };

        if !verify_password(&user, password)? {
            warn!("Login failed for user {}: password mismatch", user.id);
            return Err(CredentialError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        self.issue(&user)
    }

    /// Resolve a user ID to a user
    pub async fn validate(&self, user_id: Uuid) -> Result<PublicUser, CredentialError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|user| PublicUser::from(&user))
            .ok_or(CredentialError::UnknownUser)
    }

    /// Verify a token's signature and expiry and resolve its subject
    pub async fn authenticate(&self, token: &str) -> Result<PublicUser, CredentialError> {
        let claims = self.jwt_service.validate_token(token).map_err(|e| {
            warn!("Failed to validate token: {}", e);
            CredentialError::InvalidToken
        })?;

        self.validate(claims.sub).await
    }

    fn issue(&self, user: &User) -> Result<AuthSession, CredentialError> {
        let access_token = self.jwt_service.generate_access_token(user)?;
        Ok(AuthSession {
            access_token,
            expires_in: self.jwt_service.access_token_expiry(),
            user: PublicUser::from(user),
        })
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(password_hash)
}

fn verify_password(user: &User, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
