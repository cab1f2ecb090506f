//! Pairgate Access Engine Library
//!
//! Decides whether a player may join a game server and lets players unlock
//! access by pairing a chat account with a one-time code:
//! - `SQLite` storage for whitelist entries, codes, links and servers
//! - Registration code issuance and one-time consumption
//! - Code activation across codes, links and entries
//! - Server registry with heartbeats
//! - TTL cache and a fail-closed access gate for connection routing

pub mod activation;
pub mod cache;
pub mod codes;
pub mod context;
pub mod error;
pub mod gate;
pub mod links;
pub mod maintenance;
pub mod registry;
pub mod storage;
pub mod whitelist;

pub use context::AccessContext;
pub use error::{AccessError, Result};
