//! Retry and backoff for Slack API calls.
//!
//! One call moves through Attempting -> {Succeeded | RateLimited | Retrying | Failed}.
//! A rate-limit answer waits for the server's `Retry-After` (or the default
//! delay) and tries again without consuming the error budget. Any other error
//! waits `2^n * base_delay` and retries up to `max_retries` times. When a
//! budget runs out the caller gets an `ok: false` [`SlackResponse`], never an
//! error.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::error::{SlackError, SlackResponse, SlackResult};
use crate::config::Config;

/// Longest single rate-limit wait. Larger `Retry-After` values are clamped.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Wait used when Slack rate-limits without `Retry-After`, and the backoff base.
    pub base_delay: Duration,
    /// Retries allowed for non-rate-limit errors.
    pub max_retries: u32,
    /// Rate-limit waits allowed before giving up on the call.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_retries: 3,
            max_rate_limit_retries: 10,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> SlackResult<Self> {
        let secs = config.slack_retry_after_default_secs;
        let base_delay = Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|delay| *delay <= MAX_RETRY_AFTER)
            .ok_or_else(|| {
                SlackError::Config(format!(
                    "SLACK_RETRY_AFTER_DEFAULT_SECS must be between 0 and {}, got {}",
                    MAX_RETRY_AFTER.as_secs(),
                    secs
                ))
            })?;

        Ok(Self {
            base_delay,
            max_retries: config.slack_max_retries,
            max_rate_limit_retries: config.slack_max_rate_limit_retries,
        })
    }

    /// Parse a `Retry-After` header value in seconds.
    ///
    /// Values that are not a usable duration yield `None` so the caller falls
    /// back to `base_delay`. Very long waits are clamped to [`MAX_RETRY_AFTER`].
    pub fn parse_retry_after(raw: &str) -> Option<Duration> {
        let secs = raw.trim().parse::<f64>().ok()?;
        Duration::try_from_secs_f64(secs)
            .ok()
            .map(|delay| delay.min(MAX_RETRY_AFTER))
    }

    /// Wait before retry number `retry_count + 1`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry_count))
    }

    /// Run `attempt` until it succeeds or the policy gives up.
    pub async fn run<F, Fut>(&self, method: &str, mut attempt: F) -> SlackResponse
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SlackResult<SlackResponse>>,
    {
        let mut retry_count: u32 = 0;
        let mut rate_limit_count: u32 = 0;

        loop {
            match attempt().await {
                Ok(response) => {
                    debug!(method, retry_count, "Slack API call succeeded");
                    return response;
                }
                Err(SlackError::RateLimited { retry_after }) => {
                    if rate_limit_count >= self.max_rate_limit_retries {
                        error!(
                            method,
                            rate_limit_retries = rate_limit_count,
                            "Slack API still rate limited, giving up"
                        );
                        return SlackResponse::failure(
                            "ratelimited",
                            format!("still rate limited after {} waits", rate_limit_count),
                        );
                    }
                    rate_limit_count += 1;

                    let wait = retry_after.unwrap_or(self.base_delay);
                    warn!(
                        method,
                        retry_after_secs = wait.as_secs_f64(),
                        "Slack API rate limit reached, waiting before retry"
                    );
                    sleep(wait).await;
                }
                Err(err) if retry_count < self.max_retries => {
                    let wait = self.backoff_delay(retry_count);
                    retry_count += 1;
                    warn!(
                        method,
                        error = %err,
                        retry_count,
                        wait_secs = wait.as_secs_f64(),
                        "Slack API error, retrying with backoff"
                    );
                    sleep(wait).await;
                }
                Err(err) => {
                    error!(
                        method,
                        error = %err,
                        max_retries = self.max_retries,
                        "Slack API call reached the maximum number of retries"
                    );
                    return SlackResponse::failure(
                        err.code(),
                        format!("failed after {} retries", self.max_retries),
                    );
                }
            }
        }
    }
}
