//! Pairgate Core Library
//!
//! Shared functionality for Pairgate components:
//! - Configuration resolution and hierarchy
//! - `SQLite` pool setup and database error types
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
