//! Auth identity domain models
//!
//! An auth identity is one credential set for a shopper, independent of any
//! customer profile. The link to the customer lives in `app_metadata.customer_id`.

use super::common::{metadata_str, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Provider handled by the customer reconciliation flow
pub const EMAILPASS_PROVIDER: &str = "emailpass";

/// `app_metadata` key holding the linked customer id
pub const CUSTOMER_ID_KEY: &str = "customer_id";

/// Auth identity with its provider identities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthIdentity {
    pub id: String,
    /// Ordered by creation, oldest first
    pub provider_identities: Vec<ProviderIdentity>,
    #[serde(default)]
    pub app_metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for AuthIdentity {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            provider_identities: vec![],
            app_metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl AuthIdentity {
    /// Provider of the first provider identity
    pub fn provider(&self) -> Option<&str> {
        self.provider_identities.first().map(|p| p.provider.as_str())
    }

    /// Email claimed by the first provider identity
    pub fn resolve_email(&self) -> Option<&str> {
        self.provider_identities.first().and_then(|p| p.email())
    }

    /// Customer id recorded by the reconciler, if any
    pub fn customer_id(&self) -> Option<&str> {
        metadata_str(&self.app_metadata, CUSTOMER_ID_KEY)
    }
}

/// Provider-specific credential record belonging to an auth identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderIdentity {
    pub id: String,
    pub auth_identity_id: String,
    pub provider: String,
    /// Provider-scoped subject (the email for `emailpass`)
    pub entity_id: String,
    #[serde(default)]
    pub user_metadata: Metadata,
    /// Never serialized: holds the password hash for `emailpass`
    #[serde(default, skip_serializing)]
    pub provider_metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        Self {
            id: String::new(),
            auth_identity_id: String::new(),
            provider: String::new(),
            entity_id: String::new(),
            user_metadata: Metadata::new(),
            provider_metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }
}

impl ProviderIdentity {
    /// `user_metadata.email`, falling back to `provider_metadata.email`
    pub fn email(&self) -> Option<&str> {
        metadata_str(&self.user_metadata, "email")
            .or_else(|| metadata_str(&self.provider_metadata, "email"))
    }

    /// Stored argon2 hash for `emailpass` identities
    pub fn password_hash(&self) -> Option<&str> {
        metadata_str(&self.provider_metadata, "password")
    }
}

/// Input for creating an auth identity with a single provider identity
#[derive(Debug, Clone)]
pub struct CreateAuthIdentityInput {
    pub provider: String,
    pub entity_id: String,
    pub user_metadata: Metadata,
    pub provider_metadata: Metadata,
}

/// Email/password credentials
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailPassCredentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
