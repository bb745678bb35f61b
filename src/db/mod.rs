//! Database module for SQLite persistence.

pub mod audit;
pub mod connection;
pub mod repository;
pub mod schema;
pub mod settings;

use chrono::{NaiveDateTime, Utc};

pub use audit::AuditLog;
pub use connection::{DbConfig, DbPool, run_migrations};
pub use repository::{NewUser, UserRepository};
pub use settings::{SettingsDefaults, SettingsStore, SettingsUpdate};

/// Current UTC time as stored in the database.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
