//! Retry configuration for one logical request.

use crate::backoff::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and backoff parameters, immutable for the lifetime of a request.
///
/// Every field has a default; fields absent from a deserialized document
/// fall back to it, so callers only spell out what they change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts allowed after a response the policy rejects.
    pub max_policy_retries: u32,
    /// Extra attempts allowed after a transport failure with no response.
    pub max_transport_retries: u32,
    /// Resume a backoff sequence mid-way: when non-zero, one delay computed
    /// for this attempt ordinal precedes the first attempt. Affects only
    /// that initial delay, never the retry budgets.
    pub current_attempt_offset: u32,
    /// Legacy switch: when false, any transport failure is immediately
    /// terminal regardless of `max_transport_retries`.
    pub retry_on_transport_error: bool,
    /// Exponent base for the backoff schedule.
    pub delay_multiplier_base: f64,
    /// Hard ceiling on any single delay, in seconds.
    pub max_delay_secs: u64,
    /// Ceiling on elapsed time since the first attempt, in seconds. Caps
    /// the next delay so the deadline is never overshot.
    pub total_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_policy_retries: 2,
            max_transport_retries: 2,
            current_attempt_offset: 0,
            retry_on_transport_error: true,
            delay_multiplier_base: 2.0,
            max_delay_secs: 64,
            total_timeout_secs: 600,
        }
    }
}

impl RetryConfig {
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }

    /// The delay schedule this configuration describes.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: self.delay_multiplier_base,
            max_delay: self.max_delay(),
            total_timeout: self.total_timeout(),
        }
    }
}
