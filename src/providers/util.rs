use anyhow::{Error, anyhow};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Sent with every outbound request
pub const USER_AGENT: &str = concat!("cost-report/", env!("CARGO_PKG_VERSION"));

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Turn a non-success response into an error carrying the response body.
pub async fn check_status(response: reqwest::Response, what: &str) -> anyhow::Result<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read {what} response: {e}"))?;
    if !status.is_success() {
        return Err(anyhow!("HTTP error {status} from {what}: {text}"));
    }
    Ok(text)
}

/// Whether a response means the request was rejected for rate and can be resent.
///
/// SES signals throttling with 429, older query-style errors use 400 with a
/// `Throttling` code.
pub fn is_throttled(status: StatusCode, body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("Throttling") || body.contains("TooManyRequests")))
}
