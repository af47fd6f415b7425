//! Client configuration with defaults-then-override construction.
//!
//! All fields are populated at construction time; there is no runtime
//! partiality. Callers override individual sections with struct-update
//! syntax:
//!
//! ```
//! use std::time::Duration;
//!
//! use lms_client::{ClientConfig, RetryConfig};
//!
//! let config = ClientConfig {
//!     retry: RetryConfig { max_retries: 5, ..Default::default() },
//!     timeout: Duration::from_secs(10),
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Circuit breaker thresholds for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Number of recorded failures that opens the circuit.
    pub failure_threshold: u32,

    /// Cooldown before an open circuit admits a half-open probe.
    pub reset_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_millis(60_000) }
    }
}

/// Immutable per-client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Retry and backoff behavior.
    pub retry: RetryConfig,

    /// Circuit breaker thresholds.
    pub circuit: CircuitConfig,

    /// Timeout for a single request attempt.
    pub timeout: Duration,

    /// User agent string for requests.
    pub user_agent: String,

    /// Maximum number of redirects to follow.
    pub max_redirects: u32,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit: CircuitConfig::default(),
            timeout: Duration::from_millis(30_000),
            user_agent: format!("lms-client/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 3,
            verify_tls: true,
        }
    }
}
