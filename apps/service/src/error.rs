use std::io::Error as IoError;

use thiserror::Error;

use crate::config;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}
