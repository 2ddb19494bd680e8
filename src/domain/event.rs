//! Inbound event types

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Event name emitted after an auth identity is created
pub const IDENTITY_CREATED_EVENT: &str = "auth.identity.created";

/// Envelope delivered to the event hook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventEnvelope {
    /// Delivery id assigned by the sender, used for dedup when present
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Key identifying this delivery for dedup purposes
    pub fn dedup_key(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        self.data
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}:{}", self.name, id))
    }
}

#[derive(Deserialize)]
struct RawIdentityCreated {
    id: Option<String>,
    provider: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
}

/// Validated `auth.identity.created` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityCreatedEvent {
    pub id: String,
    pub provider: String,
    pub entity_id: String,
}

impl IdentityCreatedEvent {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Validate an untyped event payload
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let raw: RawIdentityCreated = serde_json::from_value(value.clone())
            .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;

        let id = raw
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Invalid event payload: missing id".to_string()))?;
        let provider = raw.provider.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            AppError::BadRequest("Invalid event payload: missing provider".to_string())
        })?;

        Ok(Self {
            id,
            provider,
            entity_id: raw.entity_id.unwrap_or_default(),
        })
    }
}
