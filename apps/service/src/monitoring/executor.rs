use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

use super::checker::{Checker, ProbeError};
use super::types::ProbeOutcome;
use crate::database::models::Target;

/// Probe executor - runs one timed probe against one target
pub struct ProbeExecutor {
    checker: Arc<dyn Checker>,
    timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(checker: Arc<dyn Checker>, timeout: Duration) -> Self {
        Self { checker, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `target` once and classify the result.
    ///
    /// Never fails: timeouts, transport errors and panics inside the checker
    /// all become a failed outcome for this target.
    pub async fn probe(&self, target: &Target) -> ProbeOutcome {
        let outcome = ProbeOutcome::new(target.id, Utc::now());
        let start = Instant::now();

        let attempt = AssertUnwindSafe(timeout(self.timeout, self.checker.check(&target.url)))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();

        let outcome = match attempt {
            Ok(Ok(Ok(status_code))) => outcome.responded(status_code, elapsed),
            Ok(Ok(Err(error))) => outcome.failed(&error),
            Ok(Err(_)) => outcome.failed(&ProbeError::Timeout(self.timeout)),
            Err(panic) => outcome.failed(&ProbeError::Panicked(panic_message(&*panic))),
        };

        debug!(
            target_id = target.id,
            url = %target.url,
            success = outcome.success,
            status_code = ?outcome.status_code,
            error = ?outcome.error,
            elapsed_ms = elapsed.as_millis() as u64,
            "Probe finished"
        );

        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::checker::HttpChecker;
    use crate::test_support::{Scripted, StubChecker, serve_status, unused_local_url};

    fn target(id: i64, url: &str) -> Target {
        Target {
            id,
            url: url.to_string(),
            name: format!("target-{id}"),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn http_executor() -> ProbeExecutor {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .unwrap();
        let timeout = Duration::from_secs(5);
        ProbeExecutor::new(Arc::new(HttpChecker::with_client(client, timeout)), timeout)
    }

    fn executor(checker: StubChecker, timeout: Duration) -> ProbeExecutor {
        ProbeExecutor::new(Arc::new(checker), timeout)
    }

    #[tokio::test]
    async fn test_response_sets_status_and_time() {
        let executor = executor(
            StubChecker::new().on("http://ok.test", Scripted::Status(200)),
            Duration::from_secs(10),
        );

        let outcome = executor.probe(&target(1, "http://ok.test")).await;
        assert!(outcome.success);
        assert_eq!(outcome.target_id, 1);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.response_time.is_some());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_checked_at_is_probe_start() {
        let executor = executor(
            StubChecker::new().on("http://slow.test", Scripted::Slow(Duration::from_millis(300))),
            Duration::from_secs(10),
        );

        let before = Utc::now();
        let outcome = executor.probe(&target(1, "http://slow.test")).await;
        let after = Utc::now();

        assert!(outcome.checked_at >= before);
        assert!(outcome.checked_at < after - chrono::Duration::milliseconds(200));
        assert!(outcome.response_time.unwrap() >= 0.3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_checker_is_cut_off_at_timeout() {
        let executor = executor(
            StubChecker::new().on("http://hang.test", Scripted::Hang),
            Duration::from_secs(10),
        );

        let outcome = executor.probe(&target(3, "http://hang.test")).await;
        assert!(!outcome.success);
        assert!(outcome.status_code.is_none());
        assert!(outcome.response_time.is_none());
        assert_eq!(outcome.error.as_deref(), Some("request timed out after 10s"));
    }

    #[tokio::test]
    async fn test_panicking_checker_becomes_failed_outcome() {
        let executor = executor(
            StubChecker::new().on("http://boom.test", Scripted::Panic),
            Duration::from_secs(10),
        );

        let outcome = executor.probe(&target(4, "http://boom.test")).await;
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.starts_with("probe panicked"), "{error}");
        assert!(error.contains("http://boom.test"), "{error}");
    }

    #[tokio::test]
    async fn test_real_http_probe_classification() {
        let executor = http_executor();

        let cases = [(200, true), (302, true), (399, true), (400, false), (500, false)];
        for (status, expected) in cases {
            let url = serve_status(status).await;
            let outcome = executor.probe(&target(1, &url)).await;
            assert_eq!(outcome.success, expected, "status {status}");
            assert_eq!(outcome.status_code, Some(status));
            assert!(outcome.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_unreachable_address_has_no_response_fields() {
        let executor = http_executor();
        let url = unused_local_url().await;

        let outcome = executor.probe(&target(2, &url)).await;
        assert!(!outcome.success);
        assert!(outcome.status_code.is_none());
        assert!(outcome.response_time.is_none());
        assert!(!outcome.error.unwrap_or_default().is_empty());
    }
}
