use std::{fmt, time::Duration};

use url::Url;

use crate::http::retry::RetryPolicy;

pub const DEFAULT_LNDHUB_URL: &str = "https://lndhub.herokuapp.com";

/// Connection settings for an lndhub backend.
///
/// `request_timeout` is applied to every outbound wallet call, including each retry attempt.
#[derive(Debug, Clone)]
pub struct LndHubSettings {
    pub url: Url,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl LndHubSettings {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for LndHubSettings {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_LNDHUB_URL).expect("DEFAULT_LNDHUB_URL is a valid url"))
    }
}

impl fmt::Display for LndHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "url: {}, request_timeout: {:?}, max_retries: {}",
            self.url, self.request_timeout, self.retry.max_retries
        )
    }
}

#[derive(Debug, Clone)]
pub struct LnurlSettings {
    pub metadata_timeout: Duration,
    pub callback_timeout: Duration,
}

impl Default for LnurlSettings {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(10),
            callback_timeout: Duration::from_secs(5),
        }
    }
}
