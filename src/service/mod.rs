//! Business logic layer

pub mod auth;
pub mod customer;
pub mod reconciler;

pub use auth::AuthService;
pub use customer::CustomerService;
pub use reconciler::{IdentityReconciler, ReconcileOutcome};
