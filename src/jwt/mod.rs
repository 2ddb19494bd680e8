//! JWT token handling

use crate::config::JwtConfig;
use crate::domain::Metadata;
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Audience of storefront customer tokens
pub const STOREFRONT_AUDIENCE: &str = "storefront";

/// Actor type carried by customer tokens
pub const CUSTOMER_ACTOR: &str = "customer";

/// Customer session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerClaims {
    /// Subject (auth identity ID)
    pub sub: String,
    /// Linked customer ID, empty until the identity is reconciled
    #[serde(default)]
    pub actor_id: String,
    pub actor_type: String,
    /// Snapshot of the identity's `app_metadata` at issue time
    #[serde(default)]
    pub app_metadata: Metadata,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl CustomerClaims {
    /// Customer id from the token, if one was linked at issue time
    pub fn customer_id(&self) -> Option<&str> {
        if !self.actor_id.is_empty() {
            return Some(self.actor_id.as_str());
        }
        crate::domain::metadata_str(&self.app_metadata, crate::domain::CUSTOMER_ID_KEY)
    }
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Validation with a 5 second leeway instead of the default 60
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v
    }

    /// Issue a customer token for an auth identity
    pub fn create_customer_token(
        &self,
        auth_identity_id: &str,
        app_metadata: &Metadata,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.token_ttl_secs);

        let claims = CustomerClaims {
            sub: auth_identity_id.to_string(),
            actor_id: crate::domain::metadata_str(app_metadata, crate::domain::CUSTOMER_ID_KEY)
                .unwrap_or_default()
                .to_string(),
            actor_type: CUSTOMER_ACTOR.to_string(),
            app_metadata: app_metadata.clone(),
            iss: self.config.issuer.clone(),
            aud: STOREFRONT_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    /// Verify and decode a customer token
    pub fn verify_customer_token(&self, token: &str) -> Result<CustomerClaims> {
        let mut validation = self.strict_validation();
        validation.set_audience(&[STOREFRONT_AUDIENCE]);
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<CustomerClaims>(token, &self.decoding_key, &validation)?;
        if token_data.claims.actor_type != CUSTOMER_ACTOR {
            return Err(AppError::Unauthorized("Invalid token type".to_string()));
        }
        Ok(token_data.claims)
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.config.token_ttl_secs
    }
}
