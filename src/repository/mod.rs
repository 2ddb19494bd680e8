//! Data access layer (Repository pattern)

pub mod auth_identity;
pub mod customer;
pub mod order;

pub use auth_identity::AuthIdentityRepository;
pub use customer::CustomerRepository;
pub use order::OrderRepository;
