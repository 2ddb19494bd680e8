//! Customer authentication extractor
//!
//! `AuthCustomer` validates the bearer token on `/store/customers/me*` routes
//! and resolves the customer linked to the token's auth identity.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::domain::Metadata;
use crate::error::{AppError, Result};
use crate::jwt::CustomerClaims;
use crate::repository::AuthIdentityRepository;
use crate::service::ReconcileOutcome;
use crate::state::HasServices;

/// Authenticated shopper extracted from a customer token
#[derive(Debug, Clone)]
pub struct AuthCustomer {
    /// Auth identity ID from the token's `sub` claim
    pub auth_identity_id: String,
    /// Customer ID recorded in the token, if the identity was linked at issue time
    pub customer_id: Option<String>,
    pub app_metadata: Metadata,
}

impl AuthCustomer {
    pub fn from_claims(claims: CustomerClaims) -> Self {
        let customer_id = claims.customer_id().map(str::to_string);
        Self {
            auth_identity_id: claims.sub,
            customer_id,
            app_metadata: claims.app_metadata,
        }
    }

    /// Customer linked to this identity.
    ///
    /// Tokens issued before reconciliation finished carry no customer id, so
    /// the identity store is consulted as a fallback. An identity that is
    /// still unlinked is reconciled in place.
    pub async fn resolve_customer_id<S: HasServices>(&self, state: &S) -> Result<String> {
        if let Some(id) = &self.customer_id {
            return Ok(id.clone());
        }

        let identity = state
            .identity_repo()
            .find_by_id(&self.auth_identity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found for this user".to_string()))?;

        if let Some(id) = identity.customer_id() {
            return Ok(id.to_string());
        }

        debug!(auth_identity_id = %identity.id, "Identity not linked yet, reconciling");
        match crate::api::reconcile_new_identity(state, &identity).await? {
            ReconcileOutcome::Linked { customer_id, .. } => Ok(customer_id),
            _ => Err(AppError::NotFound(
                "Customer not found for this user".to_string(),
            )),
        }
    }
}

/// Authentication errors
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No Authorization header present
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader(String),
    /// Token validation failed
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        debug!(reason = ?self, "Rejected unauthenticated request");

        let body = serde_json::json!({
            "type": "unauthorized",
            "message": "Authentication required"
        });

        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

/// Extract and validate Bearer token from Authorization header
fn extract_bearer_token(headers: &axum::http::HeaderMap) -> std::result::Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AuthError::InvalidHeader("Authorization header must use Bearer scheme".to_string())
        })
}

impl<S> FromRequestParts<S> for AuthCustomer
where
    S: HasServices + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;

        let claims = state
            .jwt_manager()
            .verify_customer_token(token)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(AuthCustomer::from_claims(claims))
    }
}
