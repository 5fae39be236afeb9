//! HTTP Retry Client
//!
//! Generic fetch wrapper with per-attempt timeouts, exponential backoff with
//! jitter, and rate-limit-aware waiting. Every upstream call in the pipeline
//! (live MCP endpoints, GitHub REST and Search) goes through this client.
//!
//! Retry policy:
//! - retry only transport failures, HTTP 429, and HTTP 5xx
//! - other 4xx responses are returned immediately so callers can branch
//!   (404 is "try the next tier", not an error)
//! - on 429 a `Retry-After` header takes precedence over the backoff curve
//! - when `x-ratelimit-remaining` drops below 5, the client waits out the
//!   `x-ratelimit-reset` window before sending the next request

use rand::Rng;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Threshold under which the remaining-quota headers trigger a proactive wait
const RATE_LIMIT_LOW_WATER: u64 = 5;

/// Buffer added past the advertised reset time
const RATE_LIMIT_RESET_BUFFER: Duration = Duration::from_secs(1);

/// Errors surfaced after the retry budget is spent.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network/transport failure (includes per-attempt timeouts)
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Upstream kept answering 429/5xx until attempts ran out
    #[error("{url} still returning HTTP {status} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        status: StatusCode,
        attempts: u32,
    },
}

/// Retry/backoff tuning for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Per-attempt timeout; a timed-out attempt counts as retryable
    pub timeout: Duration,
    /// Starting backoff, doubled (with jitter) after each retryable failure
    pub initial_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// Ceiling on the proactive rate-limit wait
    pub max_ratelimit_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            max_ratelimit_wait: Duration::from_secs(60),
        }
    }
}

/// Next backoff step: double with +/-10% jitter, capped.
#[must_use]
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    let jitter = 0.9 + rand::rng().random::<f64>() * 0.2;
    let next = current.mul_f64(2.0 * jitter);
    next.min(max)
}

/// Shared HTTP client with retry and rate-limit handling.
///
/// Constructed once and passed into the components that need it; never a
/// module-scope global.
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryConfig,
    /// Earliest instant the next request may be sent, set when upstream
    /// rate-limit headers report the quota is nearly spent
    hold_until: Mutex<Option<Instant>>,
}

impl HttpClient {
    #[must_use]
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
            hold_until: Mutex::new(None),
        }
    }

    /// GET `url` with retries. Returns the first successful or
    /// non-retryable response; errors only when the retry budget is spent.
    pub async fn get_with_retry(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<Response, FetchError> {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.wait_for_rate_limit_window().await;

            let mut request = self.client.get(url).timeout(self.retry.timeout);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            match request.send().await {
                Ok(response) => {
                    self.note_rate_limit_headers(&response).await;
                    let status = response.status();

                    if !is_retryable_status(status) {
                        // Success or a plain 4xx the caller wants to see
                        return Ok(response);
                    }

                    if attempt >= self.retry.max_attempts {
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            status,
                            attempts: attempt,
                        });
                    }

                    let wait = retry_after_of(&response).unwrap_or(backoff);
                    debug!(
                        "attempt {attempt} for {url} got HTTP {status}, retrying in {:?}",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    backoff = next_backoff(backoff, self.retry.max_backoff);
                }
                Err(source) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            source,
                        });
                    }
                    debug!("attempt {attempt} for {url} failed ({source}), retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff, self.retry.max_backoff);
                }
            }
        }
    }

    /// Convenience wrapper: GET and decode a JSON body. A non-success status
    /// or undecodable body yields `None` so tiers can fall through.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<Option<serde_json::Value>, FetchError> {
        let response = self.get_with_retry(url, headers).await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        match response.json::<serde_json::Value>().await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!("response from {url} was not JSON: {e}");
                Ok(None)
            }
        }
    }

    async fn wait_for_rate_limit_window(&self) {
        let hold = { self.hold_until.lock().await.take() };
        if let Some(until) = hold {
            let now = Instant::now();
            if until > now {
                let wait = until - now;
                warn!("rate limit nearly exhausted, waiting {:?} before next request", wait);
                tokio::time::sleep(wait).await;
            }
        }
    }

    async fn note_rate_limit_headers(&self, response: &Response) {
        let Some(remaining) = header_u64(response, "x-ratelimit-remaining") else {
            return;
        };
        if remaining >= RATE_LIMIT_LOW_WATER {
            return;
        }
        let Some(reset_epoch) = header_u64(response, "x-ratelimit-reset") else {
            return;
        };

        let now_epoch = chrono::Utc::now().timestamp().max(0) as u64;
        let until_reset = Duration::from_secs(reset_epoch.saturating_sub(now_epoch))
            + RATE_LIMIT_RESET_BUFFER;
        let wait = until_reset.min(self.retry.max_ratelimit_wait);

        warn!(
            "upstream rate limit low (remaining={remaining}), holding requests for {:?}",
            wait
        );
        let mut hold = self.hold_until.lock().await;
        *hold = Some(Instant::now() + wait);
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after_of(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}
