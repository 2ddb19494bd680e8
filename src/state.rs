//! Application state traits
//!
//! Handlers are generic over these traits so the same router can run against
//! the production `AppState` or an in-memory test state.

use crate::cache::CacheOperations;
use crate::config::Config;
use crate::jwt::JwtManager;
use crate::repository::{AuthIdentityRepository, CustomerRepository, OrderRepository};
use crate::service::{AuthService, CustomerService, IdentityReconciler};

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    /// The auth identity repository type
    type IdentityRepo: AuthIdentityRepository;
    /// The customer repository type
    type CustomerRepo: CustomerRepository;
    /// The order repository type
    type OrderRepo: OrderRepository;

    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the email/password auth service
    fn auth_service(&self) -> &AuthService<Self::IdentityRepo>;

    /// Get the customer service
    fn customer_service(&self) -> &CustomerService<Self::CustomerRepo, Self::OrderRepo>;

    /// Get the identity reconciler
    fn identity_reconciler(&self) -> &IdentityReconciler<Self::IdentityRepo, Self::CustomerRepo>;

    /// Get the identity repository (customer id fallback lookups)
    fn identity_repo(&self) -> &Self::IdentityRepo;

    /// Get the JWT manager
    fn jwt_manager(&self) -> &JwtManager;

    /// Check if the system is ready (database and cache are healthy)
    /// Returns (db_ok, cache_ok) tuple
    fn check_ready(&self) -> impl std::future::Future<Output = (bool, bool)> + Send;
}

/// Trait for states that provide event dedup caching
pub trait HasCache: Clone + Send + Sync + 'static {
    /// The cache type (AppCache or NoOpCacheManager)
    type Cache: CacheOperations + Clone + 'static;

    /// Get the cache manager
    fn cache(&self) -> &Self::Cache;
}
