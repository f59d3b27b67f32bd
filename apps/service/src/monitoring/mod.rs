/// Monitoring engine module - periodic health checks
///
/// This module is responsible for:
/// - Probing a single target over HTTP with a timeout (`checker`, `executor`)
/// - Fanning a round out across every active target (`round`)
/// - Appending each outcome to storage (`recorder`)
/// - Triggering non-overlapping rounds on a fixed cadence (`scheduler`)
pub mod checker;
pub mod executor;
pub mod recorder;
pub mod round;
pub mod scheduler;
pub mod types;


pub use checker::HttpChecker;
pub use executor::ProbeExecutor;
pub use recorder::ResultRecorder;
pub use round::{RoundCoordinator, RoundSettings};
pub use scheduler::MonitoringScheduler;
