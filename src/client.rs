//! Resilient HTTP client for the LMS backend.
//!
//! Wraps each request with a per-attempt timeout, exponential backoff
//! retries, circuit-breaker protection, and typed error classification.
//! Callers see one method, [`LmsClient::request`], and the error taxonomy in
//! [`crate::error`]; everything else is internal control flow.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::{
    circuit::{CircuitBreaker, CircuitState, ClientStats},
    config::ClientConfig,
    error::{ClientError, ErrorCategory, Result},
    time::{Clock, RealClock},
};

/// Largest error response body retained for classification and logging.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Per-request options for [`LmsClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method for the request.
    pub method: reqwest::Method,
    /// Additional request headers.
    pub headers: HashMap<String, String>,
    /// JSON request body, if any.
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: reqwest::Method::GET, headers: HashMap::new(), body: None }
    }
}

/// HTTP client for the LMS backend with retries and circuit breaking.
///
/// Uses connection pooling and a per-attempt timeout to call the backend,
/// classifies every failure into the typed taxonomy, and shares one circuit
/// breaker across clones so concurrent callers observe the same backend
/// health signal.
#[derive(Debug, Clone)]
pub struct LmsClient {
    http: reqwest::Client,
    config: ClientConfig,
    circuit: Arc<Mutex<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl LmsClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be
    /// built from the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::new_with_clock(config, Arc::new(RealClock))
    }

    /// Creates a new client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Creates a new client with an injected clock.
    ///
    /// Tests pass a `TestClock` here so backoff and rate-limit waits are
    /// observed instead of slept.
    pub fn new_with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))?;

        let circuit = Arc::new(Mutex::new(CircuitBreaker::new(config.circuit.clone())));

        Ok(Self { http, config, circuit, clock })
    }

    /// Sends a request and deserializes the JSON response body as `T`.
    ///
    /// Applies the full resilience policy: an open circuit rejects the call
    /// before any network I/O; otherwise attempts run under the configured
    /// timeout, failures are classified, retryable ones back off
    /// exponentially, rate limits wait out the server-specified delay, and
    /// authentication or validation rejections surface immediately.
    ///
    /// # Errors
    ///
    /// Rejects with one of the [`ClientError`] variants; see the error
    /// module for the retryability of each.
    pub async fn request<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "lms_request",
            request_id = %request_id,
            method = %options.method,
            url = %url
        );

        async move {
            {
                let mut circuit = self.circuit.lock().await;
                if circuit.update_state(self.clock.now()) == CircuitState::Open {
                    tracing::warn!("circuit open, rejecting request without network attempt");
                    return Err(ClientError::circuit_open());
                }
            }

            let mut attempt: u32 = 0;
            loop {
                match self.execute_attempt::<T>(url, &options, request_id, attempt).await {
                    Ok(value) => {
                        tracing::debug!(attempt, "request succeeded");
                        return Ok(value);
                    },
                    Err(error) => {
                        let category = ErrorCategory::from(&error);

                        match category {
                            ErrorCategory::Auth | ErrorCategory::Validation => {
                                self.record_failure().await;
                                tracing::warn!(
                                    attempt,
                                    error_category = %category,
                                    error = %error,
                                    "terminal error, not retrying"
                                );
                                return Err(error);
                            },
                            ErrorCategory::Deserialize => {
                                tracing::warn!(attempt, error = %error, "response decoding failed");
                                return Err(error);
                            },
                            _ => {},
                        }

                        // Server-specified delay replaces computed backoff and
                        // does not consume a retry slot or advance the backoff
                        // exponent.
                        if let Some(seconds) = error.retry_after_seconds() {
                            let delay = Duration::from_secs(seconds);
                            tracing::info!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "rate limited, honoring server-specified delay"
                            );
                            self.clock.sleep(delay).await;
                            continue;
                        }

                        if attempt < self.config.retry.max_retries {
                            let delay = self.config.retry.delay_for_attempt(attempt);
                            tracing::warn!(
                                attempt,
                                error_category = %category,
                                error = %error,
                                delay_ms = delay.as_millis() as u64,
                                "attempt failed, backing off before retry"
                            );
                            self.clock.sleep(delay).await;
                            attempt += 1;
                        } else {
                            self.record_failure().await;
                            tracing::error!(
                                attempts = attempt + 1,
                                error_category = %category,
                                error = %error,
                                "request failed, retries exhausted"
                            );
                            return Err(error);
                        }
                    },
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Sends a GET request and deserializes the response as `T`.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.request(url, RequestOptions::default()).await
    }

    /// Sends a POST request with a JSON body and deserializes the response
    /// as `T`.
    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let options =
            RequestOptions { method: reqwest::Method::POST, body: Some(body), ..Default::default() };
        self.request(url, options).await
    }

    /// Returns a read-only snapshot of circuit breaker state for monitoring.
    pub async fn stats(&self) -> ClientStats {
        self.circuit.lock().await.snapshot()
    }

    /// Forces the circuit breaker back to its initial closed state.
    ///
    /// Intended for tests and manual operator recovery.
    pub async fn reset(&self) {
        tracing::info!("circuit breaker manually reset");
        self.circuit.lock().await.reset();
    }

    /// Executes one timeout-bounded attempt and classifies the outcome.
    ///
    /// A 2xx response records success on the circuit breaker before the body
    /// is decoded. Non-2xx responses and transport failures return the
    /// classified error without touching the breaker; the retry loop decides
    /// when a failure becomes terminal and gets recorded.
    async fn execute_attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
        request_id: Uuid,
        attempt: u32,
    ) -> Result<T> {
        tracing::debug!(attempt, "starting attempt");

        let mut http_request = self.http.request(options.method.clone(), url);

        for (key, value) in &options.headers {
            http_request = http_request.header(key, value);
        }

        http_request = http_request
            .header("X-Request-Id", request_id.to_string())
            .header("X-Request-Attempt", (attempt + 1).to_string());

        if let Some(body) = &options.body {
            http_request = http_request.json(body);
        }

        let response = match http_request.send().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!(attempt, "attempt timed out");
                    return Err(ClientError::timeout(self.config.timeout));
                }
                if e.is_connect() {
                    return Err(ClientError::network(format!("connection failed: {e}"), None));
                }
                return Err(ClientError::network(e.to_string(), None));
            },
        };

        let status = response.status();
        tracing::debug!(attempt, status = status.as_u16(), "received response");

        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    ClientError::timeout(self.config.timeout)
                } else {
                    ClientError::network(
                        format!("failed to read response body: {e}"),
                        Some(status.as_u16()),
                    )
                }
            })?;

            self.circuit.lock().await.record_success();

            return serde_json::from_slice(&bytes).map_err(|e| ClientError::deserialize(e.to_string()));
        }

        let retry_after_header = parse_retry_after_header(response.headers());
        let body = read_error_body(response).await;

        Err(classify_response(status.as_u16(), &body, retry_after_header))
    }

    /// Records a terminal failure on the circuit breaker.
    async fn record_failure(&self) {
        self.circuit.lock().await.record_failure(self.clock.now());
    }
}

/// Error payload recovered from a non-2xx response.
///
/// Structured JSON when the body parses, raw text otherwise. Malformed
/// bodies never abort classification; whatever was recovered is classified.
#[derive(Debug)]
enum ErrorBody {
    Json(serde_json::Value),
    Text(String),
}

impl ErrorBody {
    /// Tries a structured parse, falling back to the raw text.
    fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).map_or_else(|_| Self::Text(raw.to_string()), Self::Json)
    }

    /// Best-effort human-readable message from the payload.
    fn message(&self) -> String {
        match self {
            Self::Json(value) => value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| value.to_string(), str::to_string),
            Self::Text(text) => text.clone(),
        }
    }

    /// Server-specified retry delay from the `retry_after` body field.
    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Json(value) => value.get("retry_after").and_then(serde_json::Value::as_u64),
            Self::Text(_) => None,
        }
    }

    /// Structured per-field validation errors, when the body carried them.
    fn field_errors(&self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => {
                value.get("validation_errors").or_else(|| value.get("errors")).cloned()
            },
            Self::Text(_) => None,
        }
    }
}

/// Classifies a non-2xx response into the typed error taxonomy.
///
/// The `retry_after` body field takes precedence over the Retry-After
/// header for rate limits. Statuses outside the explicit taxonomy map to
/// the retryable network kind; the taxonomy is closed.
fn classify_response(status: u16, raw_body: &str, retry_after_header: Option<u64>) -> ClientError {
    let body = ErrorBody::parse(raw_body);

    match status {
        401 | 403 => ClientError::auth(status, body.message()),
        400 | 422 => ClientError::validation(status, body.message(), body.field_errors()),
        429 => ClientError::rate_limited(body.retry_after_seconds().or(retry_after_header)),
        _ => ClientError::network(format!("HTTP {status}: {}", body.message()), Some(status)),
    }
}

/// Parses an integer-seconds Retry-After header.
fn parse_retry_after_header(headers: &HeaderMap) -> Option<u64> {
    headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.parse().ok()
}

/// Reads a non-2xx response body, capped for classification and logging.
async fn read_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) => {
            if bytes.len() > MAX_ERROR_BODY_BYTES {
                let truncated = String::from_utf8_lossy(&bytes[..MAX_ERROR_BODY_BYTES]);
                format!("{truncated}... (truncated)")
            } else {
                String::from_utf8_lossy(&bytes).into_owned()
            }
        },
        Err(e) => {
            tracing::warn!("failed to read error response body: {}", e);
            format!("[failed to read response body: {e}]")
        },
    }
}
