use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("invalid value for {name}: {value:?}")]
    InvalidOverride { name: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitoring: Monitoring,
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Knobs for the health-check engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    /// Seconds between the start of consecutive rounds.
    pub interval_seconds: u64,
    /// Per-probe request timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum probes in flight per round. Unset means one slot per target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Pending probes are abandoned once a round has run this long.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_deadline_seconds: Option<u64>,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            timeout_seconds: 10,
            max_concurrency: None,
            round_deadline_seconds: None,
        }
    }
}

impl Monitoring {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn round_deadline(&self) -> Option<Duration> {
        self.round_deadline_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: path::PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: path::PathBuf::from("netumo.db") }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/netumo/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("netumo/config.toml"))
}

fn parse_override<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, Error> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidOverride { name, value }),
        Err(_) => Ok(None),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        let concurrency = self
            .monitoring
            .max_concurrency
            .map_or_else(|| "per target".to_string(), |n| n.to_string());
        let deadline = self
            .monitoring
            .round_deadline_seconds
            .map_or_else(|| "none".to_string(), |s| format!("{s}s"));

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Interval", &format!("{}s", self.monitoring.interval_seconds))?;
        write_1(f, "Probe Timeout", &format!("{}s", self.monitoring.timeout_seconds))?;
        write_1(f, "Max Concurrency", &concurrency)?;
        write_1(f, "Round Deadline", &deadline)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/netumo/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply `NETUMO_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), Error> {
        if let Some(interval) = parse_override("NETUMO_INTERVAL_SECONDS")? {
            self.monitoring.interval_seconds = interval;
        }
        if let Some(timeout) = parse_override("NETUMO_TIMEOUT_SECONDS")? {
            self.monitoring.timeout_seconds = timeout;
        }
        if let Some(concurrency) = parse_override("NETUMO_MAX_CONCURRENCY")? {
            self.monitoring.max_concurrency = Some(concurrency);
        }
        if let Some(path) = parse_override::<path::PathBuf>("NETUMO_DATABASE_PATH")? {
            self.database.path = path;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        let monitoring = &self.monitoring;
        [
            validation::validate_interval(monitoring.interval_seconds),
            validation::validate_timeout(monitoring.timeout_seconds),
            validation::validate_concurrency(monitoring.max_concurrency),
            validation::validate_round_deadline(
                monitoring.round_deadline_seconds,
                monitoring.timeout_seconds,
            ),
        ]
        .iter()
        .try_for_each(|check| check.to_result())
        .map_err(|e| Error::Invalid(e.to_string()))
    }
}
