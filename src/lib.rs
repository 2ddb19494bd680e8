//! Storefront Core - customer accounts backend
//!
//! This crate provides the storefront HTTP API, the email/password auth
//! identity surface, and the reconciler that links every new auth identity
//! to exactly one customer record.

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod migration;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
