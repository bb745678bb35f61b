//! Domain errors shared by the repositories, the lifecycle services and the API.

use thiserror::Error;

/// Errors produced by the proposal lifecycle and its storage.
#[derive(Debug, Error)]
pub enum SetlistError {
    /// Malformed input: bad URL, empty required field, invalid enum value.
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    /// Valid identity lacking the required role, or an email outside the allowlists.
    #[error("{0}")]
    Forbidden(String),

    /// Uniqueness violation, e.g. a second vote by the same user.
    #[error("{0}")]
    Conflict(String),

    #[error("Rate limit exceeded: at most {limit} proposals per {window_minutes} minutes")]
    RateLimited { limit: i64, window_minutes: i64 },

    #[error("{0} not found")]
    NotFound(String),

    /// A reorder request named a proposal outside the approved setlist.
    #[error("id_not_reorderable:{0}")]
    InvalidOrder(i32),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A stored row holds a value the domain model cannot represent.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl SetlistError {
    pub fn validation(message: impl Into<String>) -> Self {
        SetlistError::Validation(message.into())
    }

    pub fn not_found(entity: &str, id: i32) -> Self {
        SetlistError::NotFound(format!("{entity} {id}"))
    }
}

/// Convenience alias used across the crate.
pub type SetlistResult<T> = Result<T, SetlistError>;
