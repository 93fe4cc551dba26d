//! Shared retry policy for the credential manager's own token exchange
//! requests and for the authorized/unauthorized sessions it hands out.
//!
//! Exponential backoff with factor 0.5 (`urllib3`-style: `0.5 * 2^(attempt-1)`),
//! honouring `Retry-After` when present, retrying on a fixed set of transient
//! status codes.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::warn;

use super::error::AuthError;

const RETRY_STATUSES: &[u16] = &[413, 429, 500, 502, 503];
const BACKOFF_FACTOR: f64 = 0.5;

fn is_retryable_status(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(d) = retry_after {
        return d;
    }
    let secs = BACKOFF_FACTOR * 2f64.powi(attempt as i32 - 1);
    Duration::from_secs_f64(secs.max(0.0))
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Sends a request built by `build`, retrying transient failures up to
/// `max_attempts` times. `build` must produce a fresh, unsent request each
/// call since a sent body cannot be replayed.
pub async fn send_with_retry<F>(build: F, max_attempts: u32) -> Result<Response, AuthError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        let request = build();
        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }
                if is_retryable_status(response.status()) && attempt < max_attempts {
                    let delay = backoff_delay(attempt, parse_retry_after(&response));
                    warn!(
                        status = %response.status(),
                        attempt,
                        max_attempts,
                        "transient HTTP error, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(e) => {
                last_err = Some(e);
                if attempt < max_attempts {
                    let delay = backoff_delay(attempt, None);
                    warn!(attempt, max_attempts, "request failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_err
        .map(AuthError::from)
        .unwrap_or_else(|| AuthError::TokenClientConnection("retries exhausted".to_string())))
}
