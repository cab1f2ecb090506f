//! Error taxonomy for the access engine.

use std::time::Duration;

use crate::storage::DatabaseError;

pub type Result<T> = std::result::Result<T, AccessError>;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl AccessError {
    /// Text safe to show a player or chat user. Storage detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{what} was not found."),
            Self::InvalidState(detail) | Self::Conflict(detail) => detail.clone(),
            Self::Storage(_) => "Something went wrong, please try again later.".to_string(),
            Self::Timeout(_) => "The request took too long, please try again.".to_string(),
        }
    }
}
