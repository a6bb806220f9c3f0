//! Per-request mutable state, owned exclusively by the orchestrator loop.

use crate::policy::{Charge, SessionSnapshot};
use std::time::Duration;
use tokio::time::Instant;

/// Where a finished request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminalState {
    Succeeded,
    Failed,
    Aborted,
}

/// Counters and timing for one logical request. Nothing outside the
/// orchestrator mutates these.
pub(crate) struct Session {
    attempts: u32,
    transport_failures: u32,
    started_at: Option<Instant>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            attempts: 0,
            transport_failures: 0,
            started_at: None,
        }
    }

    /// Record the start of a physical attempt and return its 1-based ordinal.
    /// The first call pins the deadline clock.
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        self.attempts
    }

    /// Time since the first attempt started.
    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.map_or(Duration::ZERO, |t| t.elapsed())
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempts: self.attempts,
            transport_failures: self.transport_failures,
        }
    }

    /// Apply a retry verdict's charge. Policy retries are derived from the
    /// attempt count, so only transport failures keep a dedicated counter.
    pub(crate) fn charge(&mut self, charge: Charge) {
        if charge == Charge::Transport {
            self.transport_failures += 1;
        }
    }

    pub(crate) fn finish(&self, terminal: TerminalState) {
        tracing::debug!(
            ?terminal,
            attempts = self.attempts,
            transport_failures = self.transport_failures,
            "request finished"
        );
    }
}
