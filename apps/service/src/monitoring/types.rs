use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::checker::ProbeError;

/// A probe succeeded iff a response was obtained with a status in `[200, 400)`.
///
/// `None` means no response was obtained at all.
pub fn is_success(status_code: Option<u16>) -> bool {
    matches!(status_code, Some(200..=399))
}

/// Result of one probe against one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Target that was probed
    pub target_id: i64,

    /// Observed HTTP status, absent when no response was obtained
    pub status_code: Option<u16>,

    /// Wall-clock probe duration in seconds, absent when no response was obtained
    pub response_time: Option<f64>,

    /// When the probe started
    pub checked_at: DateTime<Utc>,

    pub success: bool,

    /// Transport-level failure description
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// Create an outcome for a probe that started at `checked_at`
    pub fn new(target_id: i64, checked_at: DateTime<Utc>) -> Self {
        Self {
            target_id,
            status_code: None,
            response_time: None,
            checked_at,
            success: false,
            error: None,
        }
    }

    /// A response arrived; success follows from the status alone
    pub fn responded(mut self, status_code: u16, elapsed: Duration) -> Self {
        self.status_code = Some(status_code);
        self.response_time = Some(elapsed.as_secs_f64());
        self.success = is_success(self.status_code);
        self.error = None;
        self
    }

    /// No response was obtained
    pub fn failed(mut self, error: &ProbeError) -> Self {
        self.status_code = None;
        self.response_time = None;
        self.success = false;
        self.error = Some(error.to_string());
        self
    }
}
