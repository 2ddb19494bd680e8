//! REST API handlers and shared request/response types

pub mod auth;
pub mod customer;
pub mod health;
pub mod identity_event;
pub mod metrics;

use crate::domain::{AuthIdentity, IdentityCreatedEvent, IDENTITY_CREATED_EVENT};
use crate::error::Result;
use crate::service::ReconcileOutcome;
use crate::state::HasServices;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Maximum allowed `limit` for list endpoints
pub(crate) const MAX_LIMIT: i64 = 100;

/// Offset pagination query parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListQuery {
    #[serde(default, deserialize_with = "deserialize_offset")]
    pub offset: i64,
    #[serde(default = "default_limit", deserialize_with = "deserialize_limit")]
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
        }
    }
}

pub(crate) fn default_limit() -> i64 {
    20
}

fn deserialize_offset<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 0 {
        return Err(serde::de::Error::custom("offset must be >= 0"));
    }
    Ok(value)
}

/// Clamp `limit` into 1..=MAX_LIMIT
fn deserialize_limit<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 1 {
        return Err(serde::de::Error::custom("limit must be >= 1"));
    }
    Ok(value.min(MAX_LIMIT))
}

/// Run the reconciler in-process for an identity created by this service
pub(crate) async fn reconcile_new_identity<S: HasServices>(
    state: &S,
    identity: &AuthIdentity,
) -> Result<ReconcileOutcome> {
    let event = IdentityCreatedEvent::new(
        identity.id.clone(),
        identity.provider().unwrap_or_default(),
        identity
            .provider_identities
            .first()
            .map(|p| p.entity_id.clone())
            .unwrap_or_default(),
    );
    debug!(auth_identity_id = %event.id, event = IDENTITY_CREATED_EVENT, "Dispatching in-process");

    state.identity_reconciler().handle(&event).await
}
