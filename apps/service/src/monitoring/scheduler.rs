use anyhow::Result;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Monitoring scheduler - fires rounds on a fixed cadence.
///
/// Rounds run inline in a single loop, so a round that overruns its interval
/// delays the next one instead of overlapping it.
pub struct MonitoringScheduler {
    interval: Duration,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl MonitoringScheduler {
    /// Start firing `round_fn` every `period`, beginning immediately.
    ///
    /// Errors and panics from a round are logged and the schedule continues.
    pub fn start<F, Fut, T>(period: Duration, round_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut rounds: u64 = 0;

            info!(interval_secs = period.as_secs_f64(), "Scheduler started");

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = timer.tick() => {}
                }

                rounds += 1;
                let round = AssertUnwindSafe(async { round_fn().await }).catch_unwind().await;
                match round {
                    Ok(Ok(_)) => debug!(round = rounds, "Scheduled round finished"),
                    Ok(Err(e)) => {
                        error!(round = rounds, "Round failed, continuing schedule: {e:#}")
                    }
                    Err(_) => error!(round = rounds, "Round panicked, continuing schedule"),
                }

                if *stop_rx.borrow() {
                    break;
                }
            }

            info!(rounds, "Scheduler stopped");
        });

        Self { interval: period, stop_tx, handle: Some(handle) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the scheduling loop is still alive
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop triggering new rounds. A round already running is left to finish.
    pub fn stop(&self) {
        // Only fails once the loop has exited, which is what we want anyway.
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the scheduling loop to exit after [`stop`](Self::stop).
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Scheduler task ended abnormally: {e}");
            }
        }
    }

    /// Stop and wait for the in-flight round, if any.
    pub async fn shutdown(mut self) {
        self.stop();
        self.join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::{Instant, sleep};

    #[derive(Default)]
    struct Probe {
        started: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        spans: Mutex<Vec<(Instant, Instant)>>,
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_rounds_never_overlap() {
        let probe = Arc::new(Probe::default());
        let round_probe = probe.clone();

        let scheduler = MonitoringScheduler::start(Duration::from_secs(1), move || {
            let probe = round_probe.clone();
            async move {
                let begin = Instant::now();
                probe.started.fetch_add(1, Ordering::SeqCst);
                let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

                sleep(Duration::from_millis(2500)).await;

                probe.in_flight.fetch_sub(1, Ordering::SeqCst);
                probe.spans.lock().unwrap().push((begin, Instant::now()));
                anyhow::Ok(())
            }
        });

        sleep(Duration::from_secs(10)).await;
        scheduler.shutdown().await;

        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
        let spans = probe.spans.lock().unwrap();
        assert!(spans.len() >= 3, "only {} rounds ran", spans.len());
        assert!(spans.windows(2).all(|w| w[1].0 >= w[0].1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_follow_interval_under_normal_load() {
        let count = Arc::new(AtomicUsize::new(0));
        let round_count = count.clone();

        let scheduler = MonitoringScheduler::start(Duration::from_secs(60), move || {
            let count = round_count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });

        // Rounds at 0s, 60s, 120s
        sleep(Duration::from_secs(150)).await;
        scheduler.shutdown().await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_and_panicking_rounds_do_not_end_schedule() {
        let count = Arc::new(AtomicUsize::new(0));
        let round_count = count.clone();

        let scheduler = MonitoringScheduler::start(Duration::from_secs(1), move || {
            let count = round_count.clone();
            async move {
                match count.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(anyhow!("storage unavailable")),
                    1 => panic!("round blew up"),
                    _ => anyhow::Ok(()),
                }
            }
        });

        sleep(Duration::from_millis(4500)).await;
        assert!(scheduler.is_running());
        scheduler.shutdown().await;

        assert!(count.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_in_flight_round_finish() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (round_started, round_finished) = (started.clone(), finished.clone());

        let mut scheduler = MonitoringScheduler::start(Duration::from_secs(1), move || {
            let (started, finished) = (round_started.clone(), round_finished.clone());
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(5)).await;
                finished.store(true, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });

        sleep(Duration::from_secs(1)).await;
        scheduler.stop();
        scheduler.join().await;

        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
    }
}
