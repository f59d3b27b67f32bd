use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Compact,
}

/// Map a `RUST_LOG_FORMAT` value to an output format. Unknown values fall
/// back to compact and are handed back so the caller can report them.
fn parse_log_format(value: &str) -> (LogFormat, Option<&str>) {
    match value {
        "json" => (LogFormat::Json, None),
        "" | "compact" => (LogFormat::Compact, None),
        other => (LogFormat::Compact, Some(other)),
    }
}

/// Install the global subscriber at INFO, overridable through `RUST_LOG`.
pub fn init_tracing() {
    init_tracing_with(LevelFilter::INFO);
}

/// Install the global subscriber with `level` as the default directive.
///
/// `RUST_LOG_FORMAT=json` switches to line-delimited JSON. Calling this twice
/// is harmless; the second subscriber is discarded.
pub fn init_tracing_with(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let raw_format = var("RUST_LOG_FORMAT").unwrap_or_default();
    let (log_format, unknown) = parse_log_format(&raw_format);

    let log_layer = match log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_ok() {
        if let Some(other) = unknown {
            warn!("Unknown RUST_LOG_FORMAT '{other}', falling back to compact output");
        }
    }
}
