//! One monitoring round: snapshot the active targets, probe them all with
//! bounded concurrency, and record every outcome as soon as it is known.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use super::checker::ProbeError;
use super::executor::ProbeExecutor;
use super::recorder::ResultRecorder;
use super::types::ProbeOutcome;
use crate::database::Database;

/// Per-round limits
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundSettings {
    /// Probes in flight at once. `None` gives every target its own slot.
    pub max_concurrency: Option<usize>,
    /// Probes still pending this long after the round started are abandoned.
    pub deadline: Option<Duration>,
}

/// What one round did
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round_id: Uuid,
    /// Active targets in the snapshot
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Outcomes persisted
    pub recorded: usize,
    /// Outcomes that could not be persisted
    pub lost: usize,
    pub elapsed: Duration,
}

impl RoundSummary {
    fn new(round_id: Uuid) -> Self {
        Self {
            round_id,
            targets: 0,
            succeeded: 0,
            failed: 0,
            recorded: 0,
            lost: 0,
            elapsed: Duration::ZERO,
        }
    }
}

struct ProbeReport {
    success: bool,
    recorded: bool,
}

/// Round coordinator - fans one round out across the active targets
pub struct RoundCoordinator {
    database: Arc<dyn Database>,
    executor: Arc<ProbeExecutor>,
    recorder: Arc<ResultRecorder>,
    settings: RoundSettings,
}

impl RoundCoordinator {
    pub fn new(
        database: Arc<dyn Database>,
        executor: Arc<ProbeExecutor>,
        recorder: Arc<ResultRecorder>,
        settings: RoundSettings,
    ) -> Self {
        Self { database, executor, recorder, settings }
    }

    pub fn recorder(&self) -> &Arc<ResultRecorder> {
        &self.recorder
    }

    /// Run exactly one round.
    ///
    /// Fails only when the target snapshot cannot be read; individual probe
    /// and storage failures are absorbed into the summary.
    pub async fn run_round(&self) -> Result<RoundSummary> {
        let round_id = Uuid::new_v4();
        let span = info_span!("round", %round_id);
        self.run(round_id).instrument(span).await
    }

    async fn run(&self, round_id: Uuid) -> Result<RoundSummary> {
        let started = Instant::now();
        let mut summary = RoundSummary::new(round_id);

        let targets = self
            .database
            .list_active_targets()
            .await
            .context("failed to load active targets")?;
        summary.targets = targets.len();

        if targets.is_empty() {
            info!("No active targets, nothing to probe");
            return Ok(summary);
        }

        // At most one slot per target.
        let slots = self
            .settings
            .max_concurrency
            .map_or(targets.len(), |cap| cap.min(targets.len()))
            .max(1);
        let semaphore = Arc::new(Semaphore::new(slots));
        let deadline = self
            .settings
            .deadline
            .map(|limit| (tokio::time::Instant::now() + limit, limit));
        info!(
            targets = targets.len(),
            slots,
            timeout_secs = self.executor.timeout().as_secs_f64(),
            "Starting round"
        );

        let mut probes = JoinSet::new();
        for target in targets {
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);
            let recorder = Arc::clone(&self.recorder);

            let task = async move {
                let queued_at = Utc::now();
                let probe = async {
                    match semaphore.acquire().await {
                        Ok(_permit) => executor.probe(&target).await,
                        Err(_) => ProbeOutcome::new(target.id, queued_at)
                            .failed(&ProbeError::Request("probe slots closed".to_string())),
                    }
                };

                let outcome = match deadline {
                    Some((at, limit)) => match tokio::time::timeout_at(at, probe).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(
                                target_id = target.id,
                                url = %target.url,
                                "Probe abandoned at round deadline"
                            );
                            ProbeOutcome::new(target.id, queued_at)
                                .failed(&ProbeError::DeadlineExceeded(limit))
                        }
                    },
                    None => probe.await,
                };

                if !outcome.success {
                    info!(
                        target_id = target.id,
                        name = %target.name,
                        status_code = ?outcome.status_code,
                        error = ?outcome.error,
                        "Target check failed"
                    );
                }

                let recorded = recorder.record(&outcome).await;
                ProbeReport { success: outcome.success, recorded }
            };

            probes.spawn(task.instrument(Span::current()));
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(report) => {
                    if report.success {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    if report.recorded {
                        summary.recorded += 1;
                    } else {
                        summary.lost += 1;
                    }
                }
                Err(e) => {
                    error!("Probe task died before recording its outcome: {e}");
                    summary.failed += 1;
                    summary.lost += 1;
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            targets = summary.targets,
            succeeded = summary.succeeded,
            failed = summary.failed,
            recorded = summary.recorded,
            lost = summary.lost,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Round complete"
        );

        Ok(summary)
    }
}
