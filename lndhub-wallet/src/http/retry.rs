//! Retry with exponential backoff for transient backend failures.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for requests against the wallet backend.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    /// Status codes treated as transient
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: Duration) -> Self {
        Self {
            max_retries,
            backoff_factor,
            ..Default::default()
        }
    }

    /// A policy that sends exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// The first retry is immediate, after that the delay is
    /// `backoff_factor * 2^(retry - 1)` capped at `max_backoff`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(retry - 1);
        std::cmp::min(
            self.backoff_factor.saturating_mul(multiplier),
            self.max_backoff,
        )
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Sends the request, retrying on transient statuses and connect/timeout errors.
    ///
    /// Once retries are exhausted the last response (or error) is returned to the caller.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, reqwest::Error> {
        let mut retry = 0;
        loop {
            let attempt = match request.try_clone() {
                Some(attempt) => attempt,
                // streaming bodies can't be replayed
                None => return request.send().await,
            };

            match attempt.send().await {
                Ok(response)
                    if retry < self.max_retries && self.is_retryable_status(response.status()) =>
                {
                    warn!(
                        status = response.status().as_u16(),
                        url = %response.url(),
                        retry = retry + 1,
                        max_retries = self.max_retries,
                        "transient status, will retry"
                    );
                }
                Err(err) if retry < self.max_retries && (err.is_connect() || err.is_timeout()) => {
                    warn!(
                        error = %err,
                        retry = retry + 1,
                        max_retries = self.max_retries,
                        "transport error, will retry"
                    );
                }
                result => return result,
            }

            retry += 1;
            let delay = self.delay_for_retry(retry);
            if !delay.is_zero() {
                debug!(retry, ?delay, "waiting before retry");
                sleep(delay).await;
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_secs(10),
            max_backoff: Duration::from_secs(120),
            retry_statuses: vec![500, 502, 503, 504],
        }
    }
}
