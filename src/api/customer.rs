//! Storefront customer endpoints

use crate::api::{reconcile_new_identity, ListQuery};
use crate::domain::{CustomerWithAddresses, EmailPassCredentials, OrderList, UpdateCustomerInput};
use crate::error::AppError;
use crate::middleware::AuthCustomer;
use crate::service::ReconcileOutcome;
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer: CustomerWithAddresses,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    #[serde(flatten)]
    pub list: OrderList,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// POST /store/customers
///
/// Registers an emailpass identity, links it to a customer and applies the
/// optional profile fields. Retrying with the same credentials after a failed
/// link completes the registration instead of conflicting.
pub async fn create<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(email), Some(password)) = (
        input.email.filter(|e| !e.trim().is_empty()),
        input.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    };

    let credentials = EmailPassCredentials { email, password };
    let identity = match state.auth_service().register_emailpass(&credentials).await {
        Ok(identity) => identity,
        Err(AppError::Conflict(msg)) => {
            // A previous attempt may have registered the identity but failed
            // to link it; the same credentials resume that attempt
            match state.auth_service().authenticate(&credentials).await {
                Ok(identity) if identity.customer_id().is_none() => {
                    info!(auth_identity_id = %identity.id, "Resuming unlinked registration");
                    identity
                }
                _ => return Err(AppError::Conflict(msg)),
            }
        }
        Err(e) => return Err(e),
    };

    let customer_id = match reconcile_new_identity(&state, &identity).await? {
        ReconcileOutcome::Linked { customer_id, .. } => customer_id,
        other => {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Customer could not be linked to identity {}: {}",
                identity.id,
                other.label()
            )))
        }
    };

    let customer = state
        .customer_service()
        .update(
            &customer_id,
            UpdateCustomerInput {
                first_name: input.first_name,
                last_name: input.last_name,
                phone: input.phone,
                metadata: None,
            },
        )
        .await?;

    info!(customer_id = %customer_id, "Customer registered");
    Ok((StatusCode::CREATED, Json(CustomerResponse { customer })))
}

/// GET /store/customers/me
pub async fn me<S: HasServices>(
    State(state): State<S>,
    auth: AuthCustomer,
) -> Result<impl IntoResponse, AppError> {
    let customer_id = auth.resolve_customer_id(&state).await?;
    let customer = state
        .customer_service()
        .get_with_addresses(&customer_id)
        .await?;

    Ok(Json(CustomerResponse { customer }))
}

/// POST /store/customers/me
pub async fn update_me<S: HasServices>(
    State(state): State<S>,
    auth: AuthCustomer,
    Json(input): Json<UpdateCustomerInput>,
) -> Result<impl IntoResponse, AppError> {
    let customer_id = auth.resolve_customer_id(&state).await?;
    let customer = state
        .customer_service()
        .update(&customer_id, input)
        .await?;

    Ok(Json(CustomerResponse { customer }))
}

/// GET /store/customers/me/orders
pub async fn my_orders<S: HasServices>(
    State(state): State<S>,
    auth: AuthCustomer,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let customer_id = auth.resolve_customer_id(&state).await?;
    let list = state
        .customer_service()
        .list_orders(&customer_id, query.offset, query.limit)
        .await?;

    Ok(Json(OrderListResponse {
        list,
        offset: query.offset,
        limit: query.limit,
    }))
}
