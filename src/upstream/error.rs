//! Classified upstream failures
//!
//! Timeouts, network failures, and 5xx responses are retried in place; 429 is
//! handed back to the caller for model fallback; other 4xx are terminal and
//! surfaced verbatim.

use thiserror::Error;

/// One classified failure from a single upstream attempt
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("network error reaching upstream: {0}")]
    Network(String),

    #[error("upstream server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("upstream rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("upstream rejected request ({status}): {message}")]
    Client { status: u16, message: String },
}

impl UpstreamError {
    /// Classify an HTTP error status with its extracted message
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => UpstreamError::RateLimited { message },
            s if s >= 500 => UpstreamError::Server { status: s, message },
            s => UpstreamError::Client { status: s, message },
        }
    }

    /// Original HTTP status, when the failure carried one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Timeout | UpstreamError::Network(_) => None,
            UpstreamError::Server { status, .. } | UpstreamError::Client { status, .. } => {
                Some(*status)
            }
            UpstreamError::RateLimited { .. } => Some(429),
        }
    }

    /// True for transient failures the dispatcher retries in place
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::Timeout | UpstreamError::Network(_) | UpstreamError::Server { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    /// The upstream message without our classification wrapper
    pub fn message(&self) -> String {
        match self {
            UpstreamError::Timeout => "upstream request timed out".to_string(),
            UpstreamError::Network(message) => message.clone(),
            UpstreamError::Server { message, .. }
            | UpstreamError::RateLimited { message }
            | UpstreamError::Client { message, .. } => message.clone(),
        }
    }
}

/// Final error after the dispatcher gave up, annotated with the attempt count
#[derive(Debug, Error)]
#[error("request failed after {attempts} attempt(s): {source}")]
pub struct DispatchError {
    pub attempts: u32,
    #[source]
    pub source: UpstreamError,
}

impl DispatchError {
    pub fn status_code(&self) -> Option<u16> {
        self.source.status_code()
    }
}
