//! Connection pool and migrations.

use crate::DatabaseResult;
use derive_getters::Getters;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use giotto_error::{DatabaseError, DatabaseErrorKind};
use std::path::Path;
use std::time::Duration;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Pool of SQLite connections.
pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

/// A connection checked out of the pool; returned when dropped.
pub type SqlitePooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Pragmas applied to every connection as it is checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct ConnectionOptions {
    /// How long a writer waits on a locked database
    busy_timeout: Duration,
    /// Write-ahead logging, so readers do not block the writer
    enable_wal: bool,
    /// Enforce jobs → pipeline_states references
    enable_foreign_keys: bool,
    /// Maximum pooled connections
    pool_size: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            enable_wal: true,
            enable_foreign_keys: true,
            pool_size: 4,
        }
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!("PRAGMA busy_timeout = {};", self.busy_timeout.as_millis());
        if self.enable_wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        if self.enable_foreign_keys {
            pragmas.push_str(" PRAGMA foreign_keys = ON;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Open a pool on the database file, creating parent directories, and run
/// pending migrations.
#[tracing::instrument(skip(options), fields(path = %path.display()))]
pub fn establish_pool(path: &Path, options: ConnectionOptions) -> DatabaseResult<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Connection(format!(
                "Failed to create {}: {}",
                parent.display(),
                e
            )))
        })?;
    }

    let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(options.pool_size.max(1))
        .connection_customizer(Box::new(options))
        .build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    tracing::debug!("Database ready");

    Ok(pool)
}

/// Apply any migrations not yet recorded in the database.
pub fn run_migrations(conn: &mut SqliteConnection) -> DatabaseResult<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| {
            if !applied.is_empty() {
                tracing::info!(count = applied.len(), "Applied migrations");
            }
        })
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))
}
