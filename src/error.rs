//! Error types for LMS backend requests.
//!
//! Defines the closed taxonomy of failures a request can surface: transport
//! and timeout problems, authentication rejections, validation failures,
//! server-side rate limiting, and circuit-breaker refusals. Each classified
//! error carries the HTTP status that produced it (where one exists) and a
//! timestamp, and knows whether retrying it can ever succeed.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure modes of a request against the LMS backend.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport failure, request timeout, or 5xx-class response.
    #[error("network request failed: {message}")]
    Network {
        /// Description of the transport or server failure
        message: String,
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// When the failure was classified
        timestamp: DateTime<Utc>,
    },

    /// Request rejected with 401 or 403.
    #[error("authentication rejected: HTTP {status}")]
    Auth {
        /// HTTP status code (401 or 403)
        status: u16,
        /// Response body content
        body: String,
        /// When the failure was classified
        timestamp: DateTime<Utc>,
    },

    /// Request rejected with 400 or 422.
    #[error("validation failed: HTTP {status}: {message}")]
    Validation {
        /// HTTP status code (400 or 422)
        status: u16,
        /// Summary message recovered from the response body
        message: String,
        /// Structured per-field errors, when the body carried them
        field_errors: Option<serde_json::Value>,
        /// When the failure was classified
        timestamp: DateTime<Utc>,
    },

    /// Server throttled the request with 429.
    #[error("rate limited{}", .retry_after_seconds.map(|s| format!(": retry after {s}s")).unwrap_or_default())]
    RateLimited {
        /// Server-specified wait before retrying, when provided
        retry_after_seconds: Option<u64>,
        /// When the failure was classified
        timestamp: DateTime<Utc>,
    },

    /// Circuit breaker is open, request refused without network I/O.
    #[error("circuit breaker open, request not attempted")]
    CircuitOpen {
        /// When the request was refused
        timestamp: DateTime<Utc>,
    },

    /// HTTP client could not be constructed from the given configuration.
    #[error("invalid client configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Successful response body did not match the expected type.
    #[error("failed to decode response body: {message}")]
    Deserialize {
        /// Decode error message
        message: String,
        /// When the failure occurred
        timestamp: DateTime<Utc>,
    },
}

impl ClientError {
    /// Creates a network error from a message and optional status code.
    pub fn network(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Network { message: message.into(), status, timestamp: Utc::now() }
    }

    /// Creates a network error describing a timed-out attempt.
    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::Network {
            message: format!("request timed out after {}ms", timeout.as_millis()),
            status: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates an authentication error from an HTTP response.
    pub fn auth(status: u16, body: impl Into<String>) -> Self {
        Self::Auth { status, body: body.into(), timestamp: Utc::now() }
    }

    /// Creates a validation error from an HTTP response.
    pub fn validation(
        status: u16,
        message: impl Into<String>,
        field_errors: Option<serde_json::Value>,
    ) -> Self {
        Self::Validation { status, message: message.into(), field_errors, timestamp: Utc::now() }
    }

    /// Creates a rate-limit error with optional server-specified delay.
    pub fn rate_limited(retry_after_seconds: Option<u64>) -> Self {
        Self::RateLimited { retry_after_seconds, timestamp: Utc::now() }
    }

    /// Creates a circuit-open error.
    pub fn circuit_open() -> Self {
        Self::CircuitOpen { timestamp: Utc::now() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates a response-decoding error.
    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::Deserialize { message: message.into(), timestamp: Utc::now() }
    }

    /// Determines if this error represents a temporary failure that can be
    /// retried.
    ///
    /// Network failures (including timeouts and 5xx responses) and rate
    /// limits are retryable. Authentication and validation rejections cannot
    /// succeed without caller-side correction, and circuit-open refusals must
    /// wait out the cooldown.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            Self::Auth { .. }
            | Self::Validation { .. }
            | Self::CircuitOpen { .. }
            | Self::Configuration { .. }
            | Self::Deserialize { .. } => false,
        }
    }

    /// Returns the server-specified retry delay in seconds, when present.
    ///
    /// `None` means standard exponential backoff applies.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_seconds, .. } => *retry_after_seconds,
            _ => None,
        }
    }

    /// Returns the HTTP status code that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            Self::Auth { status, .. } | Self::Validation { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::CircuitOpen { .. } | Self::Configuration { .. } | Self::Deserialize { .. } => {
                None
            },
        }
    }
}

/// Category of client error for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport, timeout, or server-side failures.
    Network,
    /// Authentication rejections.
    Auth,
    /// Request validation failures.
    Validation,
    /// Server-imposed throttling.
    RateLimit,
    /// Circuit breaker protection.
    Circuit,
    /// Client configuration problems.
    Configuration,
    /// Response decoding failures.
    Deserialize,
}

impl From<&ClientError> for ErrorCategory {
    fn from(error: &ClientError) -> Self {
        match error {
            ClientError::Network { .. } => Self::Network,
            ClientError::Auth { .. } => Self::Auth,
            ClientError::Validation { .. } => Self::Validation,
            ClientError::RateLimited { .. } => Self::RateLimit,
            ClientError::CircuitOpen { .. } => Self::Circuit,
            ClientError::Configuration { .. } => Self::Configuration,
            ClientError::Deserialize { .. } => Self::Deserialize,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Auth => write!(f, "auth"),
            Self::Validation => write!(f, "validation"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Circuit => write!(f, "circuit"),
            Self::Configuration => write!(f, "configuration"),
            Self::Deserialize => write!(f, "deserialize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn retryable_errors_identified_correctly() {
        // Retryable errors
        assert!(ClientError::network("connection refused", None).is_retryable());
        assert!(ClientError::timeout(Duration::from_secs(30)).is_retryable());
        assert!(ClientError::network("HTTP 503", Some(503)).is_retryable());
        assert!(ClientError::rate_limited(Some(60)).is_retryable());
        assert!(ClientError::rate_limited(None).is_retryable());

        // Non-retryable errors
        assert!(!ClientError::auth(401, "unauthorized").is_retryable());
        assert!(!ClientError::validation(422, "missing field", None).is_retryable());
        assert!(!ClientError::circuit_open().is_retryable());
        assert!(!ClientError::configuration("bad redirect policy").is_retryable());
        assert!(!ClientError::deserialize("expected object").is_retryable());
    }

    #[test]
    fn rate_limit_retry_after_extracted() {
        assert_eq!(ClientError::rate_limited(Some(120)).retry_after_seconds(), Some(120));
        assert_eq!(ClientError::rate_limited(None).retry_after_seconds(), None);
        assert_eq!(ClientError::timeout(Duration::from_secs(30)).retry_after_seconds(), None);
    }

    #[test]
    fn status_codes_carried() {
        assert_eq!(ClientError::auth(403, "forbidden").status(), Some(403));
        assert_eq!(ClientError::validation(400, "bad request", None).status(), Some(400));
        assert_eq!(ClientError::network("HTTP 502", Some(502)).status(), Some(502));
        assert_eq!(ClientError::rate_limited(None).status(), Some(429));
        assert_eq!(ClientError::circuit_open().status(), None);
    }

    #[test]
    fn error_categories_mapped_correctly() {
        assert_eq!(ErrorCategory::from(&ClientError::network("test", None)), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from(&ClientError::auth(401, "no")), ErrorCategory::Auth);
        assert_eq!(
            ErrorCategory::from(&ClientError::validation(422, "bad", None)),
            ErrorCategory::Validation
        );
        assert_eq!(
            ErrorCategory::from(&ClientError::rate_limited(Some(5))),
            ErrorCategory::RateLimit
        );
        assert_eq!(ErrorCategory::from(&ClientError::circuit_open()), ErrorCategory::Circuit);
    }

    #[test]
    fn error_display_format() {
        let timeout = ClientError::timeout(Duration::from_secs(30));
        assert_eq!(timeout.to_string(), "network request failed: request timed out after 30000ms");

        assert_eq!(
            ClientError::rate_limited(Some(90)).to_string(),
            "rate limited: retry after 90s"
        );
        assert_eq!(ClientError::rate_limited(None).to_string(), "rate limited");
        assert_eq!(
            ClientError::circuit_open().to_string(),
            "circuit breaker open, request not attempted"
        );
    }
}
