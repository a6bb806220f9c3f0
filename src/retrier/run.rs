//! The retry loops: attempt, decide, schedule, deliver.

use super::session::{Session, TerminalState};
use super::{Completed, RequestStream, Retrier};
use crate::error::{RequestError, TransportError};
use crate::executor::RunningAttempt;
use crate::policy::Verdict;
use crate::relay::{StreamEvent, StreamRelay};
use crate::transport::{AttemptEvent, AttemptOutcome, Transport};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the external event channel handed to stream consumers.
const STREAM_CHANNEL_CAPACITY: usize = 32;

impl<T: Transport> Retrier<T> {
    /// Run the request to completion, buffering the committed attempt's body.
    ///
    /// Resolves exactly once: `Ok` with the committed response (accepted or
    /// budget-exhausted rejected), or `Err` with the last transport error.
    pub async fn execute(&self, request: &T::Request) -> Result<Completed<T::Chunk>, RequestError> {
        self.execute_cancellable(request, &CancellationToken::new())
            .await
    }

    /// [`execute`](Self::execute) with caller-controlled cancellation.
    ///
    /// Cancelling the token aborts the in-flight attempt, drops any pending
    /// scheduled retry, and resolves `Err(RequestError::Aborted)`.
    pub async fn execute_cancellable(
        &self,
        request: &T::Request,
        cancel: &CancellationToken,
    ) -> Result<Completed<T::Chunk>, RequestError> {
        let config = &self.inner.config;
        let backoff = config.backoff();
        let mut session = Session::new();

        // Resuming a sequence mid-way: one delay before the first attempt.
        if config.current_attempt_offset > 0 {
            let delay = backoff.next_delay(config.current_attempt_offset, Duration::ZERO);
            if !sleep_or_cancel(delay, cancel).await {
                return Err(RequestError::Aborted);
            }
        }

        loop {
            if cancel.is_cancelled() {
                session.finish(TerminalState::Aborted);
                return Err(RequestError::Aborted);
            }
            let attempt_no = session.begin_attempt();
            tracing::debug!(attempt = attempt_no, "starting attempt");
            let mut attempt = RunningAttempt::start(&self.inner.transport, request);

            let outcome = tokio::select! {
                outcome = attempt.outcome() => Some(outcome),
                () = cancel.cancelled() => None,
            };
            let outcome = match outcome {
                Some(outcome) => outcome,
                None => {
                    attempt.abort();
                    session.finish(TerminalState::Aborted);
                    return Err(RequestError::Aborted);
                }
            };

            match self
                .inner
                .policy
                .evaluate(&outcome, session.snapshot(), config)
            {
                Verdict::Commit => {
                    return match outcome {
                        AttemptOutcome::Responded { response, body } => {
                            tracing::debug!(
                                attempt = attempt_no,
                                status = response.status,
                                "committed"
                            );
                            session.finish(TerminalState::Succeeded);
                            Ok(Completed { response, body })
                        }
                        AttemptOutcome::TransportFailure(err) => {
                            tracing::debug!(attempt = attempt_no, error = %err, "failed");
                            session.finish(TerminalState::Failed);
                            Err(RequestError::Transport(err))
                        }
                    };
                }
                Verdict::Retry(charge) => {
                    session.charge(charge);
                    // Release the attempt's resource before scheduling.
                    attempt.abort();
                    let delay = backoff.next_delay(attempt_no, session.elapsed());
                    tracing::debug!(
                        attempt = attempt_no,
                        ?charge,
                        delay_ms = delay.as_millis() as u64,
                        "retrying"
                    );
                    if !sleep_or_cancel(delay, cancel).await {
                        session.finish(TerminalState::Aborted);
                        return Err(RequestError::Aborted);
                    }
                }
            }
        }
    }

    /// Run the request as an event stream.
    ///
    /// Spawns a driver task, so this must be called within a tokio runtime.
    /// Discarded attempts show up only as `Request` events; the body of the
    /// committed attempt is relayed as if it were the only one.
    pub fn stream(&self, request: T::Request) -> RequestStream<T::Chunk> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let driver = self.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            driver.drive_stream(request, tx, token).await;
        });
        RequestStream::new(rx, cancel)
    }

    async fn drive_stream(
        &self,
        request: T::Request,
        out: mpsc::Sender<StreamEvent<T::Chunk>>,
        cancel: CancellationToken,
    ) {
        let config = &self.inner.config;
        let backoff = config.backoff();
        let mut session = Session::new();
        let mut relay = StreamRelay::new(out);

        if config.current_attempt_offset > 0 {
            let delay = backoff.next_delay(config.current_attempt_offset, Duration::ZERO);
            if !sleep_or_cancel(delay, &cancel).await {
                session.finish(TerminalState::Aborted);
                return;
            }
        }

        loop {
            if cancel.is_cancelled() {
                session.finish(TerminalState::Aborted);
                return;
            }
            let attempt_no = session.begin_attempt();
            if !relay.announce(attempt_no).await {
                return;
            }
            relay.begin_attempt();
            tracing::debug!(attempt = attempt_no, "starting attempt");
            let mut attempt = RunningAttempt::start(&self.inner.transport, &request);

            // Wait for the attempt's verdict point: its response head or a
            // transport-level failure. Chunks seen before the verdict stay
            // in the relay's sink.
            let head = loop {
                let event = tokio::select! {
                    event = attempt.next_event() => Some(event),
                    () = cancel.cancelled() => None,
                };
                let event = match event {
                    Some(event) => event,
                    None => {
                        attempt.abort();
                        session.finish(TerminalState::Aborted);
                        return;
                    }
                };
                match event {
                    Some(AttemptEvent::Response(head)) => break Ok(head),
                    Some(AttemptEvent::Chunk(chunk)) => relay.capture(chunk),
                    Some(AttemptEvent::Error(err)) => break Err(err),
                    Some(AttemptEvent::Complete) => {
                        break Err(TransportError::new("transport completed without a response"))
                    }
                    None => break Err(TransportError::new("transport ended without a response")),
                }
            };

            let verdict = match &head {
                Ok(response) => {
                    self.inner
                        .policy
                        .evaluate_response(response, session.snapshot(), config)
                }
                Err(_) => self.inner.policy.evaluate_failure(session.snapshot(), config),
            };

            match verdict {
                Verdict::Retry(charge) => {
                    session.charge(charge);
                    relay.discard(&mut attempt);
                    let delay = backoff.next_delay(attempt_no, session.elapsed());
                    tracing::debug!(
                        attempt = attempt_no,
                        ?charge,
                        delay_ms = delay.as_millis() as u64,
                        "retrying"
                    );
                    if !sleep_or_cancel(delay, &cancel).await {
                        session.finish(TerminalState::Aborted);
                        return;
                    }
                }
                Verdict::Commit => match head {
                    Err(err) => {
                        tracing::debug!(attempt = attempt_no, error = %err, "failed");
                        session.finish(TerminalState::Failed);
                        relay.fail(RequestError::Transport(err)).await;
                        return;
                    }
                    Ok(response) => {
                        let status = response.status;
                        if !relay.commit(response).await {
                            attempt.abort();
                            return;
                        }
                        tracing::debug!(attempt = attempt_no, status, "committed");
                        relay_body(attempt, relay, session, cancel).await;
                        return;
                    }
                },
            }
        }
    }
}

/// Live relay of the committed attempt's body until its terminal signal.
async fn relay_body<T: Transport>(
    mut attempt: RunningAttempt<T>,
    mut relay: StreamRelay<T::Chunk>,
    session: Session,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = attempt.next_event() => Some(event),
            () = cancel.cancelled() => None,
        };
        let event = match event {
            Some(event) => event,
            None => {
                attempt.abort();
                session.finish(TerminalState::Aborted);
                return;
            }
        };
        match event {
            Some(AttemptEvent::Chunk(chunk)) => {
                if !relay.forward(chunk).await {
                    attempt.abort();
                    return;
                }
            }
            Some(AttemptEvent::Complete) => {
                session.finish(TerminalState::Succeeded);
                relay.complete().await;
                return;
            }
            // Post-commit transport errors propagate verbatim: a retry
            // would mean restarting after bytes were already delivered.
            Some(AttemptEvent::Error(err)) => {
                session.finish(TerminalState::Failed);
                relay.fail(RequestError::Transport(err)).await;
                return;
            }
            // A second head would be a transport bug; drop it.
            Some(AttemptEvent::Response(_)) => {}
            None => {
                session.finish(TerminalState::Failed);
                relay
                    .fail(RequestError::Transport(TransportError::new(
                        "transport ended mid-body",
                    )))
                    .await;
                return;
            }
        }
    }
}

/// Cancellable deferred retry: true when the delay elapsed, false when the
/// token fired first.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        () = cancel.cancelled() => false,
    }
}
