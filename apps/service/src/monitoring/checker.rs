use anyhow::Result;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Why a probe obtained no response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("abandoned at round deadline after {}s", .0.as_secs_f64())]
    DeadlineExceeded(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("probe panicked: {0}")]
    Panicked(String),
}

/// Checker trait for issuing a single liveness request
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform one request against `url` and return the response status code
    async fn check(&self, url: &str) -> Result<u16, ProbeError>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Record the target's own status; 3xx already counts as alive.
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("netumo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    #[cfg(test)]
    /// Use a preconfigured client. `timeout` is only used to describe timeouts.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn classify(&self, error: reqwest::Error) -> ProbeError {
        if error.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else if error.is_connect() {
            ProbeError::Connect(error_chain(&error))
        } else {
            ProbeError::Request(error_chain(&error))
        }
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;
        Ok(response.status().as_u16())
    }
}

/// reqwest hides the useful part (refused, dns, tls) in the source chain
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
