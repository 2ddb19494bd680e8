//! Email/password authentication

use crate::domain::{
    AuthIdentity, CreateAuthIdentityInput, EmailPassCredentials, Metadata, EMAILPASS_PROVIDER,
};
use crate::error::{AppError, Result};
use crate::jwt::JwtManager;
use crate::repository::AuthIdentityRepository;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct AuthService<I: AuthIdentityRepository> {
    identities: Arc<I>,
    jwt_manager: JwtManager,
}

impl<I: AuthIdentityRepository> AuthService<I> {
    pub fn new(identities: Arc<I>, jwt_manager: JwtManager) -> Self {
        Self {
            identities,
            jwt_manager,
        }
    }

    /// Create an `emailpass` auth identity.
    ///
    /// The caller is responsible for dispatching `auth.identity.created`.
    pub async fn register_emailpass(&self, credentials: &EmailPassCredentials) -> Result<AuthIdentity> {
        credentials.validate()?;

        if self
            .identities
            .find_by_provider_entity(EMAILPASS_PROVIDER, &credentials.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Identity with this email already exists".to_string(),
            ));
        }

        let mut user_metadata = Metadata::new();
        user_metadata.insert("email".to_string(), credentials.email.clone().into());

        let mut provider_metadata = Metadata::new();
        provider_metadata.insert("password".to_string(), hash_password(&credentials.password)?.into());

        let identity = self
            .identities
            .create(&CreateAuthIdentityInput {
                provider: EMAILPASS_PROVIDER.to_string(),
                entity_id: credentials.email.clone(),
                user_metadata,
                provider_metadata,
            })
            .await?;

        info!(auth_identity_id = %identity.id, "Registered emailpass identity");
        Ok(identity)
    }

    /// Check email/password credentials
    pub async fn authenticate(&self, credentials: &EmailPassCredentials) -> Result<AuthIdentity> {
        let identity = self
            .identities
            .find_by_provider_entity(EMAILPASS_PROVIDER, &credentials.email)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let hash = identity
            .provider_identities
            .iter()
            .find(|p| p.provider == EMAILPASS_PROVIDER)
            .and_then(|p| p.password_hash())
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&credentials.password, hash)? {
            debug!(auth_identity_id = %identity.id, "Password mismatch");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        Ok(identity)
    }

    /// Reload an identity, e.g. after reconciliation touched its metadata
    pub async fn get_identity(&self, id: &str) -> Result<AuthIdentity> {
        self.identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Auth identity not found".to_string()))
    }

    /// Issue a customer token reflecting the identity's current metadata
    pub fn issue_token(&self, identity: &AuthIdentity) -> Result<String> {
        self.jwt_manager
            .create_customer_token(&identity.id, &identity.app_metadata)
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2 hash
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    use argon2::{PasswordHash, PasswordVerifier};

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
