//! Domain models for Storefront Core

pub mod auth_identity;
pub mod common;
pub mod customer;
pub mod event;
pub mod order;

pub use auth_identity::*;
pub use common::*;
pub use customer::*;
pub use event::*;
pub use order::*;
