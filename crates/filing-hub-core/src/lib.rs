//! # FilingHub Core
//!
//! Core data models, database schema, and shared utilities for the FilingHub
//! filing acquisition system. This crate provides the foundation layer that
//! the searcher, acquisition, and library crates depend on.

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod schema;

// Re-export commonly used types
pub use config::Config;
pub use database::{create_pool, run_migrations, DatabasePool};
pub use error::{AppError, AppResult};

// Re-export all models for convenience
pub use models::*;
