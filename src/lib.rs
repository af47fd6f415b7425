//! Resilient HTTP client for the LMS backend.
//!
//! This crate implements the client-side resilience layer between the
//! application and the external learning-management-system API: retry with
//! exponential backoff, a circuit-breaker state machine, rate-limit-aware
//! waits, per-attempt timeouts, and a closed typed error taxonomy.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ request::<T>(url, options)
//!               │
//!               ▼
//!        ┌──────────────┐  open   ┌────────────────────┐
//!        │ circuit gate │────────▶│ CircuitOpen error  │
//!        └──────────────┘         └────────────────────┘
//!               │ closed / half-open
//!               ▼
//!        ┌──────────────┐ non-2xx ┌────────────────────┐
//!        │ bounded      │────────▶│ classify + retry   │
//!        │ HTTP attempt │         │ or surface error   │
//!        └──────────────┘         └────────────────────┘
//!               │ 2xx
//!               ▼
//!        record success, decode JSON as T
//! ```
//!
//! # Key Features
//!
//! - **Circuit breaking** - an open circuit fails fast with no network I/O,
//!   then probes recovery through a half-open state
//! - **Exponential backoff** - capped, deterministic delays between retries
//! - **Rate-limit awareness** - HTTP 429 waits out the server-specified
//!   delay instead of a computed one
//! - **Typed errors** - every terminal failure is one of the
//!   [`ClientError`] kinds, never an ambiguous generic failure
//!
//! # Example
//!
//! ```no_run
//! use lms_client::{ClientConfig, LmsClient};
//! use serde_json::Value;
//!
//! # async fn example() -> lms_client::Result<()> {
//! let client = LmsClient::new(ClientConfig::default())?;
//!
//! let course: Value = client.get("https://lms.example.com/api/courses/42").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit;
pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod time;

// Re-export main public API
pub use circuit::{CircuitState, ClientStats};
pub use client::{LmsClient, RequestOptions};
pub use config::{CircuitConfig, ClientConfig};
pub use error::{ClientError, ErrorCategory, Result};
pub use reqwest::Method;
pub use retry::RetryConfig;
pub use time::{Clock, RealClock, TestClock};
