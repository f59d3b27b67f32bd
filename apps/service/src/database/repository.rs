use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, params};

use super::models::{MonitoringResult, Target, datetime_to_millis, millis_to_datetime};
use crate::monitoring::types::ProbeOutcome;
use crate::pool::LibsqlPool;

const TARGET_COLUMNS: &str = "id, url, name, active, created_at";
const RESULT_COLUMNS: &str =
    "id, target_id, status_code, response_time, checked_at, success, error";

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Snapshot of every target currently marked active
    async fn list_active_targets(&self) -> Result<Vec<Target>>;

    /// All targets, active or not
    async fn list_targets(&self) -> Result<Vec<Target>>;

    /// Get a target by id
    async fn get_target(&self, id: i64) -> Result<Option<Target>>;

    /// Register a new, active target
    async fn create_target(&self, name: &str, url: &str) -> Result<Target>;

    /// Flip the active flag; returns false when no such target exists
    async fn set_target_active(&self, id: i64, active: bool) -> Result<bool>;

    /// Append one probe outcome
    async fn insert_result(&self, outcome: &ProbeOutcome) -> Result<i64>;

    /// Newest results first, optionally limited to one target
    async fn list_results(
        &self,
        target_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<MonitoringResult>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        self.pool.get().await.context("failed to get database connection")
    }
}

fn target_from_row(row: &Row) -> Result<Target> {
    Ok(Target {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        active: row.get::<i64>(3)? != 0,
        created_at: millis_to_datetime(row.get(4)?),
    })
}

fn result_from_row(row: &Row) -> Result<MonitoringResult> {
    Ok(MonitoringResult {
        id: row.get(0)?,
        target_id: row.get(1)?,
        status_code: row.get::<Option<i64>>(2)?.map(|v| v as u16),
        response_time: row.get(3)?,
        checked_at: millis_to_datetime(row.get(4)?),
        success: row.get::<i64>(5)? != 0,
        error: row.get(6)?,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_active_targets(&self) -> Result<Vec<Target>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {TARGET_COLUMNS} FROM targets WHERE active = 1 ORDER BY id"),
                (),
            )
            .await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(target_from_row(&row)?);
        }

        Ok(targets)
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {TARGET_COLUMNS} FROM targets ORDER BY id"), ())
            .await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(target_from_row(&row)?);
        }

        Ok(targets)
    }

    async fn get_target(&self, id: i64) -> Result<Option<Target>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(target_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_target(&self, name: &str, url: &str) -> Result<Target> {
        let conn = self.get_conn().await?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO targets (url, name, active, created_at) VALUES (?, ?, 1, ?)",
            params![url, name, datetime_to_millis(created_at)],
        )
        .await
        .with_context(|| format!("failed to register target {url}"))?;

        Ok(Target {
            id: conn.last_insert_rowid(),
            url: url.to_string(),
            name: name.to_string(),
            active: true,
            created_at: millis_to_datetime(datetime_to_millis(created_at)),
        })
    }

    async fn set_target_active(&self, id: i64, active: bool) -> Result<bool> {
        let conn = self.get_conn().await?;
        let changed = conn
            .execute(
                "UPDATE targets SET active = ? WHERE id = ?",
                params![if active { 1 } else { 0 }, id],
            )
            .await?;
        Ok(changed > 0)
    }

    async fn insert_result(&self, outcome: &ProbeOutcome) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitoring_results (target_id, status_code, response_time, checked_at, success, error) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                outcome.target_id,
                outcome.status_code.map(|v| v as i64),
                outcome.response_time,
                datetime_to_millis(outcome.checked_at),
                if outcome.success { 1 } else { 0 },
                outcome.error.clone()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn list_results(
        &self,
        target_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<MonitoringResult>> {
        let conn = self.get_conn().await?;
        let limit = limit as i64;

        let mut rows = match target_id {
            Some(target_id) => {
                conn.query(
                    &format!("SELECT {RESULT_COLUMNS} FROM monitoring_results WHERE target_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?"),
                    params![target_id, limit],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("SELECT {RESULT_COLUMNS} FROM monitoring_results ORDER BY checked_at DESC, id DESC LIMIT ?"),
                    params![limit],
                )
                .await?
            }
        };

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(result_from_row(&row)?);
        }

        Ok(results)
    }
}
