//! Shared HTTP retry utilities for outbound API clients.
//!
//! Retries on transient failures: 5xx, 429, connection errors, and
//! timeouts. Never retries other 4xx (auth problems, bad requests).

use std::time::Duration;

use rand::Rng;
use reqwest::{RequestBuilder, Response};
use tracing::warn;

use crate::error::{Error, Result};

/// Total attempts per request (1 initial + 2 retries).
const MAX_ATTEMPTS: u32 = 3;

/// Backoff cap in seconds.
const MAX_BACKOFF_SECS: u64 = 8;

/// Per-request timeout applied by the shared clients.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the crate's standard HTTP client.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

fn retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

fn backoff_delay(attempt: u32) -> Duration {
    // 1s, 2s, 4s... capped, with a little jitter to avoid thundering
    // herds across concurrent market tasks.
    let base = (1u64 << attempt.saturating_sub(1).min(3)).min(MAX_BACKOFF_SECS);
    let jitter_ms = rand::thread_rng().gen_range(0..250);
    Duration::from_millis(base * 1000 + jitter_ms)
}

/// Send a request with bounded retries on transient failures.
///
/// The builder closure is invoked per attempt so request signatures
/// (which embed timestamps) are regenerated on retry. Builder errors
/// (e.g. signing failures) propagate immediately.
///
/// # Errors
/// `Error::Api` for non-success statuses (after retries for 5xx/429),
/// `Error::Http` when the transport fails on the final attempt.
pub async fn send_with_retry<F>(build: F) -> Result<Response>
where
    F: Fn() -> Result<RequestBuilder>,
{
    let mut attempt = 0;
    loop {
        let result = build()?.send().await;
        attempt += 1;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let status_code = status.as_u16();
                if retryable_status(status_code) && attempt < MAX_ATTEMPTS {
                    warn!(status = status_code, attempt, "retrying transient HTTP status");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                let body = response.text().await.unwrap_or_default();
                let snippet = body.chars().take(300).collect();
                return Err(Error::Api {
                    status: status_code,
                    body: snippet,
                });
            }
            Err(e) => {
                let transient = e.is_connect() || e.is_timeout();
                if transient && attempt < MAX_ATTEMPTS {
                    warn!(error = %e, attempt, "retrying transient HTTP failure");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                return Err(Error::Http(e));
            }
        }
    }
}

/// Send and deserialize a JSON body.
pub async fn json_with_retry<F, T>(build: F) -> Result<T>
where
    F: Fn() -> Result<RequestBuilder>,
    T: serde::de::DeserializeOwned,
{
    let response = send_with_retry(build).await?;
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(retryable_status(500));
        assert!(retryable_status(503));
        assert!(retryable_status(429));
        assert!(!retryable_status(400));
        assert!(!retryable_status(401));
        assert!(!retryable_status(404));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let d1 = backoff_delay(1);
        let d2 = backoff_delay(2);
        let d9 = backoff_delay(9);
        assert!(d1 >= Duration::from_secs(1) && d1 < Duration::from_secs(2));
        assert!(d2 >= Duration::from_secs(2) && d2 < Duration::from_secs(3));
        assert!(d9 < Duration::from_secs(9));
    }
}
