//! Common types for domain models

use uuid::Uuid;

/// Free-form JSON object stored on identities and customers
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Entity id prefixes
pub mod prefix {
    pub const AUTH_IDENTITY: &str = "authid";
    pub const PROVIDER_IDENTITY: &str = "provid";
    pub const CUSTOMER: &str = "cus";
    pub const CUSTOMER_ADDRESS: &str = "cuaddr";
}

/// Generate a prefixed, time-ordered entity id such as `cus_01928f...`
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::now_v7().simple())
}

/// Read a non-empty string value from a metadata map
pub fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}
