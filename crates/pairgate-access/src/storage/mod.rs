//! `SQLite` storage for the Pairgate access engine.
//!
//! Provides persistence for whitelist entries, registration codes, player
//! links and the server registry.

mod db;
mod dialect;
mod models;
mod queries_activation;
mod queries_codes;
mod queries_entries;
mod queries_links;
mod queries_servers;

#[cfg(test)]
mod tests;

pub use db::{AccessDatabase, DatabaseError};
pub use models::*;
pub use queries_activation::{ActivationOutcome, ActivationWrite};
pub use queries_codes::CodeParams;
pub use queries_entries::EntryParams;
pub use queries_links::LinkParams;
