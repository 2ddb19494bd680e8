//! HTTP middleware for Storefront Core
//!
//! - `AuthCustomer` bearer-token extractor
//! - Request ID and metrics layer

pub mod auth;
pub mod metrics;

pub use auth::{AuthCustomer, AuthError};
pub use metrics::ObservabilityLayer;
