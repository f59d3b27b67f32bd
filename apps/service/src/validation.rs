use anyhow::{Result, anyhow};
use url::Url;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(anyhow!(self.error.clone().unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate a target URL. Only http and https endpoints can be probed.
pub fn validate_target_url(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target URL cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate target name
pub fn validate_target_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed.len() > 100 {
        return ValidationResult::err("Name too long (max 100 characters)");
    }

    ValidationResult::ok()
}

/// Validate round interval
pub fn validate_interval(interval: u64) -> ValidationResult {
    if interval == 0 {
        return ValidationResult::err("Interval must be at least 1 second");
    }

    if interval > 86400 {
        return ValidationResult::err("Interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}

/// Validate probe timeout
pub fn validate_timeout(timeout: u64) -> ValidationResult {
    if timeout == 0 {
        return ValidationResult::err("Timeout must be at least 1 second");
    }

    if timeout > 300 {
        return ValidationResult::err("Timeout too long (max 5 minutes)");
    }

    ValidationResult::ok()
}

/// Validate the per-round concurrency cap. `None` means uncapped.
pub fn validate_concurrency(max_concurrency: Option<usize>) -> ValidationResult {
    match max_concurrency {
        Some(0) => ValidationResult::err("Max concurrency must be at least 1"),
        _ => ValidationResult::ok(),
    }
}

/// A round deadline shorter than one probe timeout would abandon every slow
/// probe before its own timeout could classify it.
pub fn validate_round_deadline(deadline: Option<u64>, timeout: u64) -> ValidationResult {
    match deadline {
        Some(deadline) if deadline < timeout => ValidationResult::err(format!(
            "Round deadline ({deadline}s) must not be shorter than the probe timeout ({timeout}s)"
        )),
        _ => ValidationResult::ok(),
    }
}
