//! Email/password auth endpoints for storefront customers

use crate::api::reconcile_new_identity;
use crate::domain::EmailPassCredentials;
use crate::error::AppError;
use crate::service::ReconcileOutcome;
use crate::state::HasServices;
use axum::{extract::State, response::IntoResponse, Json};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /auth/customer/emailpass/register
///
/// Creates the auth identity and reconciles it to a customer right away. A
/// failed reconciliation does not fail registration: login and
/// `/store/customers/me` retry the link for an identity that is still unlinked.
pub async fn register<S: HasServices>(
    State(state): State<S>,
    Json(credentials): Json<EmailPassCredentials>,
) -> Result<impl IntoResponse, AppError> {
    let identity = match state.auth_service().register_emailpass(&credentials).await {
        Ok(identity) => identity,
        Err(e) => {
            counter!("storefront_auth_register_total", "result" => "failure").increment(1);
            return Err(e);
        }
    };
    counter!("storefront_auth_register_total", "result" => "success").increment(1);

    if let Err(e) = reconcile_new_identity(&state, &identity).await {
        warn!(auth_identity_id = %identity.id, error = %e, "Customer link deferred");
    }

    let identity = state.auth_service().get_identity(&identity.id).await?;
    let token = state.auth_service().issue_token(&identity)?;

    Ok(Json(TokenResponse { token }))
}

/// POST /auth/customer/emailpass
pub async fn login<S: HasServices>(
    State(state): State<S>,
    Json(credentials): Json<EmailPassCredentials>,
) -> Result<impl IntoResponse, AppError> {
    let identity = match state.auth_service().authenticate(&credentials).await {
        Ok(identity) => identity,
        Err(e) => {
            counter!("storefront_auth_login_total", "result" => "failure").increment(1);
            return Err(e);
        }
    };
    counter!("storefront_auth_login_total", "result" => "success").increment(1);

    // Finish a link that registration could not complete
    let identity = if identity.customer_id().is_none() {
        let outcome = reconcile_new_identity(&state, &identity).await;
        match outcome {
            Ok(ReconcileOutcome::Linked { .. }) => {
                state.auth_service().get_identity(&identity.id).await?
            }
            Ok(_) => identity,
            Err(e) => {
                warn!(auth_identity_id = %identity.id, error = %e, "Customer link deferred");
                identity
            }
        }
    } else {
        identity
    };

    let token = state.auth_service().issue_token(&identity)?;
    Ok(Json(TokenResponse { token }))
}
