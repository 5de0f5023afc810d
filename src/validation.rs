//! Input validation module
//!
//! Request-parameter checks shared by the backend client (before any network
//! call) and the HTTP handlers (operator input).

use serde::Deserialize;
use tracing::{debug, warn};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Backend request constraints
pub struct RequestConstraints;

impl RequestConstraints {
    /// History limit accepted by the backend
    pub const LIMIT_MIN: u32 = 1;
    pub const LIMIT_MAX: u32 = 1000;

    /// RFID reader wait, in seconds
    pub const SCAN_TIMEOUT_MIN: u32 = 1;
    pub const SCAN_TIMEOUT_MAX: u32 = 30;
    pub const SCAN_TIMEOUT_DEFAULT: u32 = 10;
}

/// Badge lookup / add-to-mission request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BadgeRequest {
    #[validate(length(min = 1, max = 64, message = "Badge must be 1-64 characters"))]
    pub badge: String,
    /// Add the firefighter to the mission after a successful lookup
    #[serde(default = "default_true")]
    pub add_to_mission: bool,
}

/// RFID scan request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 128, message = "Port must be 1-128 characters"))]
    pub port: String,
    #[validate(range(min = 1, max = 30, message = "Timeout must be between 1 and 30 seconds"))]
    pub timeout: Option<u32>,
}

fn default_true() -> bool {
    true
}

/// Run derive-based validation and flatten field errors into one message.
pub fn validate_request<T: Validate>(input: &T) -> AppResult<()> {
    if let Err(validation_errors) = input.validate() {
        let error_messages: Vec<String> = validation_errors
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let msgs: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|c| c.as_ref()))
                    .collect();
                format!("{}: {}", field, msgs.join(", "))
            })
            .collect();

        warn!(errors = ?error_messages, "Request validation failed");
        return Err(AppError::ValidationError(error_messages.join("; ")));
    }

    debug!("Request validation passed");
    Ok(())
}

/// Non-blank identifier, trimmed
pub fn check_identifier(raw: &str) -> Result<&str, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("identifier must not be blank".to_string());
    }
    Ok(trimmed)
}

pub fn check_limit(limit: u32) -> Result<u32, String> {
    if !(RequestConstraints::LIMIT_MIN..=RequestConstraints::LIMIT_MAX).contains(&limit) {
        return Err(format!(
            "limit {} out of range [{}, {}]",
            limit,
            RequestConstraints::LIMIT_MIN,
            RequestConstraints::LIMIT_MAX
        ));
    }
    Ok(limit)
}

pub fn check_scan_timeout(seconds: u32) -> Result<u32, String> {
    if !(RequestConstraints::SCAN_TIMEOUT_MIN..=RequestConstraints::SCAN_TIMEOUT_MAX).contains(&seconds) {
        return Err(format!(
            "scan timeout {}s out of range [{}, {}]",
            seconds,
            RequestConstraints::SCAN_TIMEOUT_MIN,
            RequestConstraints::SCAN_TIMEOUT_MAX
        ));
    }
    Ok(seconds)
}

/// Validate pagination parameters
pub fn validate_pagination(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> AppResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);

    if page == 0 {
        return Err(AppError::ValidationError(
            "Page number must be greater than 0".to_string(),
        ));
    }

    check_limit(limit).map_err(|_| {
        AppError::ValidationError(format!(
            "Limit must be between {} and {}",
            RequestConstraints::LIMIT_MIN,
            RequestConstraints::LIMIT_MAX
        ))
    })?;

    Ok((page, limit))
}
