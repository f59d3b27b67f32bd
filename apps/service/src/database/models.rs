use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::ProbeOutcome;

/// Target model - a monitored endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// MonitoringResult model - a persisted probe outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringResult {
    pub id: i64,
    pub target_id: i64,
    pub status_code: Option<u16>,
    /// Seconds
    pub response_time: Option<f64>,
    pub checked_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl MonitoringResult {
    /// The outcome this row was written from.
    #[cfg(test)]
    pub fn outcome(&self) -> ProbeOutcome {
        ProbeOutcome {
            target_id: self.target_id,
            status_code: self.status_code,
            response_time: self.response_time,
            checked_at: self.checked_at,
            success: self.success,
            error: self.error.clone(),
        }
    }
}

/// Convert a timestamp to milliseconds since the Unix epoch
pub fn datetime_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert milliseconds since the Unix epoch to a timestamp
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
