//! Database connection pool and management.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use std::time::Duration;

/// Type alias for our connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout in seconds.
    pub connection_timeout: u64,
    /// How long a writer waits on a locked database before giving up, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "setlist.db".to_string(),
            max_connections: 10,
            connection_timeout: 30,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// capped at a single connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: ":memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    /// Build a connection pool from this configuration.
    pub fn build_pool(&self) -> Result<DbPool, diesel::r2d2::PoolError> {
        let manager = ConnectionManager::<SqliteConnection>::new(&self.database_url);

        Pool::builder()
            .max_size(self.max_connections)
            .connection_timeout(Duration::from_secs(self.connection_timeout))
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout_ms: self.busy_timeout_ms,
            }))
            .build(manager)
    }
}

/// Per-connection pragmas applied whenever the pool opens a connection.
///
/// Foreign keys are off by default in SQLite; cascades on votes and proposals
/// depend on them.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Run the SQL migrations to set up the database schema.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            image TEXT,
            is_admin BOOLEAN NOT NULL DEFAULT FALSE,
            api_key TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(conn)?;

    // Create unique index for API key lookups (only for non-null values)
    diesel::sql_query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_api_key ON users(api_key) WHERE api_key IS NOT NULL",
    )
    .execute(conn)?;

    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS proposals (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            proposer_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            chart_url TEXT,
            lyrics_url TEXT,
            youtube_url TEXT,
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (status IN ('PENDING', 'APPROVED', 'ARCHIVED')),
            setlist_order INTEGER CHECK (setlist_order IS NULL OR setlist_order > 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(conn)?;

    diesel::sql_query(
        "CREATE INDEX IF NOT EXISTS idx_proposals_status ON proposals(status)",
    )
    .execute(conn)?;

    // At most one approved proposal per setlist slot
    diesel::sql_query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_proposals_setlist_order ON proposals(setlist_order) \
         WHERE status = 'APPROVED' AND setlist_order IS NOT NULL",
    )
    .execute(conn)?;

    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            proposal_id INTEGER NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, proposal_id)
        )
        "#,
    )
    .execute(conn)?;

    diesel::sql_query(
        "CREATE INDEX IF NOT EXISTS idx_votes_proposal_id ON votes(proposal_id)",
    )
    .execute(conn)?;

    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
            vote_threshold INTEGER NOT NULL CHECK (vote_threshold > 0),
            admin_allowlist TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(conn)?;

    // Audit entries outlive the users they mention, so user_id is not a foreign key.
    diesel::sql_query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_id INTEGER NOT NULL,
            action TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(conn)?;

    diesel::sql_query(
        "CREATE INDEX IF NOT EXISTS idx_audit_log_user_action ON audit_log(user_id, action, created_at)",
    )
    .execute(conn)?;

    Ok(())
}
