use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
///
/// The registry and results readers share this database; only the service
/// applies schema changes.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    // Readers keep working while the recorder appends.
    conn.query("PRAGMA journal_mode = WAL", ()).await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Initial schema").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Index results by target and check time").await?;
    }

    tracing::info!(
        "Database migrations completed successfully (now at version {})",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query("SELECT MAX(version) FROM schema_migrations", ())
        .await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: targets and monitoring_results
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS targets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    // status_code and response_time stay NULL when no response was obtained
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitoring_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_id INTEGER NOT NULL,
            status_code INTEGER,
            response_time REAL,
            checked_at INTEGER NOT NULL,
            success INTEGER NOT NULL,
            error TEXT,
            FOREIGN KEY (target_id) REFERENCES targets(id)
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_targets_active ON targets(active)", ()).await?;

    Ok(())
}

/// Migration v2: results are listed newest-first, optionally per target
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitoring_results_checked_at ON monitoring_results(checked_at DESC)",
        (),
    )
    .await?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitoring_results_target_checked_at ON monitoring_results(target_id, checked_at DESC)",
        (),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_pool;

    #[tokio::test]
    async fn test_migrations_are_idempotent() -> Result<()> {
        let (pool, _dir) = create_test_pool().await?;
        let conn = pool.get().await?;

        // Already applied once by the helper
        run_migrations(&conn).await?;

        assert_eq!(get_current_version(&conn).await?, SCHEMA_VERSION);

        let mut rows = conn.query("SELECT COUNT(*) FROM schema_migrations", ()).await?;
        let row = rows.next().await?.expect("count row");
        assert_eq!(row.get::<i64>(0)?, SCHEMA_VERSION as i64);
        Ok(())
    }
}
