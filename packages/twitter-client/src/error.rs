//! Error types for the X API client.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for X API client operations.
pub type Result<T> = std::result::Result<T, TwitterError>;

/// X API client errors.
#[derive(Debug, Error)]
pub enum TwitterError {
    /// Configuration error (missing bearer token, too many ids per request)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429. `reset_at` comes from the `x-rate-limit-reset` header.
    #[error("Rate limited (resets at {})", describe_reset(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

fn describe_reset(reset_at: &Option<DateTime<Utc>>) -> String {
    reset_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}

impl TwitterError {
    /// True when the request should be retried after a cooldown.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TwitterError::RateLimited { .. })
    }
}
