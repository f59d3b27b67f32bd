/// Database abstraction layer
///
/// Targets are read from, and probe outcomes appended to, a local LibSQL
/// (SQLite) file shared with the registry and results readers.

pub mod repository;
pub mod migrations;
pub mod models;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
