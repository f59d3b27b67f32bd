use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use deadpool::managed::{self, Pool, RecycleError, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        // Concurrent recorder inserts contend for the write lock; wait instead of failing.
        let pragma = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT.as_millis());
        conn.query(&pragma, ()).await?;
        conn.query("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(RecycleError::Message("connection returned no rows".into()))?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

/// Open (or create) the local database file and wrap it in a pool.
pub async fn open_local(path: impl AsRef<Path>) -> Result<LibsqlPool> {
    let database = libsql::Builder::new_local(path.as_ref()).build().await?;
    let pool = Pool::builder(LibsqlManager::new(database)).build()?;
    Ok(pool)
}
