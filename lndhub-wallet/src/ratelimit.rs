use reqwest::header::HeaderMap;
use tracing::warn;

use crate::error::LndHubWalletError;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-Ratelimit-Remaining";

/// Quota assumed when the backend doesn't send the header.
pub const DEFAULT_REMAINING: u64 = 100;

/// Requests below this remaining quota are refused.
pub const LOW_WATER_MARK: u64 = 10;

/// Checks the remaining quota reported by the backend.
///
/// Runs on every privileged response before the status or body is looked at.
pub fn check_rate_limit(headers: &HeaderMap) -> Result<(), LndHubWalletError> {
    let remaining = remaining_quota(headers);
    if remaining < LOW_WATER_MARK {
        return Err(LndHubWalletError::RateLimitExceeded {
            remaining,
            headers: headers.clone(),
        });
    }
    Ok(())
}

fn remaining_quota(headers: &HeaderMap) -> u64 {
    let Some(value) = headers.get(RATE_LIMIT_REMAINING_HEADER) else {
        return DEFAULT_REMAINING;
    };

    match value.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(remaining) => remaining.max(0) as u64,
        None => {
            warn!(?value, "unparseable {RATE_LIMIT_REMAINING_HEADER} header");
            DEFAULT_REMAINING
        }
    }
}
