//! Retry verdicts: which outcomes retry, and which budget they charge.

use crate::config::RetryConfig;
use crate::transport::{AttemptOutcome, ResponseHead};
use std::fmt;
use std::sync::Arc;

/// Which retry budget a discarded attempt consumes.
///
/// The budgets are independent: a transport failure never consumes policy
/// budget and vice versa, so interleaved failures are allowed up to
/// `max_transport_retries + max_policy_retries` extra attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Transport failed with no response.
    Transport,
    /// The response arrived but the policy rejected it.
    Policy,
}

/// Decision for the attempt that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Discard the attempt's output and try again, charging the given budget.
    Retry(Charge),
    /// Surface this outcome to the caller and stop.
    Commit,
}

/// Counter snapshot a verdict is computed from.
///
/// `attempts` includes the attempt under evaluation; `transport_failures`
/// counts only failures charged *before* it. Verdicts are pure functions of
/// this snapshot: evaluating twice changes nothing, and the orchestrator
/// applies the charge exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub attempts: u32,
    pub transport_failures: u32,
}

/// Default application-level retry test: informational statuses, rate
/// limiting, and server errors. Success/redirect (2xx/3xx) and ordinary
/// client errors (400-428, 430-499) commit.
pub fn default_should_retry(response: &ResponseHead) -> bool {
    matches!(response.status, 100..=199 | 429 | 500..=599)
}

type Predicate = Arc<dyn Fn(&ResponseHead) -> bool + Send + Sync>;

/// Application-level retry decision plus the two-budget accounting.
#[derive(Clone)]
pub struct RetryPolicy {
    should_retry: Predicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(default_should_retry)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy").finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Policy with a caller-supplied predicate deciding whether a response
    /// is worth retrying.
    pub fn new(should_retry: impl Fn(&ResponseHead) -> bool + Send + Sync + 'static) -> Self {
        Self {
            should_retry: Arc::new(should_retry),
        }
    }

    /// Verdict for a finished attempt.
    pub fn evaluate<C>(
        &self,
        outcome: &AttemptOutcome<C>,
        session: SessionSnapshot,
        config: &RetryConfig,
    ) -> Verdict {
        match outcome {
            AttemptOutcome::TransportFailure(_) => self.evaluate_failure(session, config),
            AttemptOutcome::Responded { response, .. } => {
                self.evaluate_response(response, session, config)
            }
        }
    }

    /// Verdict for an attempt that failed with no response.
    pub fn evaluate_failure(&self, session: SessionSnapshot, config: &RetryConfig) -> Verdict {
        // Legacy short-circuit: surface the error immediately.
        if !config.retry_on_transport_error {
            return Verdict::Commit;
        }
        if session.transport_failures >= config.max_transport_retries {
            Verdict::Commit
        } else {
            Verdict::Retry(Charge::Transport)
        }
    }

    /// Verdict for an attempt that produced a response.
    pub fn evaluate_response(
        &self,
        response: &ResponseHead,
        session: SessionSnapshot,
        config: &RetryConfig,
    ) -> Verdict {
        if !(self.should_retry)(response) {
            return Verdict::Commit;
        }
        // Attempts charged to the transport budget do not count here.
        let policy_attempts = session.attempts.saturating_sub(session.transport_failures);
        if policy_attempts > config.max_policy_retries {
            Verdict::Commit
        } else {
            Verdict::Retry(Charge::Policy)
        }
    }
}
