use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, trace};

use super::types::ProbeOutcome;
use crate::database::Database;

/// Appends probe outcomes to storage, one independent insert each.
///
/// A failed insert is logged and counted; the outcome is not retried.
pub struct ResultRecorder {
    database: Arc<dyn Database>,
    recorded: AtomicU64,
    failed: AtomicU64,
}

impl ResultRecorder {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database, recorded: AtomicU64::new(0), failed: AtomicU64::new(0) }
    }

    /// Persist `outcome`. Returns whether it was stored.
    pub async fn record(&self, outcome: &ProbeOutcome) -> bool {
        match self.database.insert_result(outcome).await {
            Ok(id) => {
                self.recorded.fetch_add(1, Ordering::Relaxed);
                trace!(target_id = outcome.target_id, result_id = id, "Outcome recorded");
                true
            }
            Err(e) => {
                let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    target_id = outcome.target_id,
                    success = outcome.success,
                    status_code = ?outcome.status_code,
                    failed_total = failed,
                    "Failed to record probe outcome: {e:#}"
                );
                false
            }
        }
    }

    /// Outcomes stored since startup
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Outcomes lost to storage failures since startup
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
