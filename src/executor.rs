//! Runs one physical attempt and owns its cancellation surface.

use crate::error::TransportError;
use crate::transport::{AttemptEvent, AttemptHandle, AttemptOutcome, ResponseHead, Transport};
use tokio::sync::mpsc;

/// One in-flight attempt: the transport's event feed plus its handle.
///
/// The handle is owned exclusively here and released on the first abort;
/// the orchestrator drops the whole value on commit or discard, so at most
/// one handle exists per logical request at any time.
pub(crate) struct RunningAttempt<T: Transport> {
    pub(crate) events: mpsc::Receiver<AttemptEvent<T::Chunk>>,
    handle: Option<T::Handle>,
}

impl<T: Transport> RunningAttempt<T> {
    pub(crate) fn start(transport: &T, request: &T::Request) -> Self {
        let (events, handle) = transport.start(request);
        Self {
            events,
            handle: Some(handle),
        }
    }

    /// Abort the attempt's underlying I/O: native cancellation when the
    /// transport offers it, generic teardown otherwise. Idempotent, and a
    /// no-op once the handle has been released.
    pub(crate) fn abort(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if !handle.cancel() {
                handle.close();
            }
        }
    }

    /// Next event from the transport, if the channel is still open.
    pub(crate) async fn next_event(&mut self) -> Option<AttemptEvent<T::Chunk>> {
        self.events.recv().await
    }

    /// Collect the whole attempt into a single outcome (buffered mode).
    pub(crate) async fn outcome(&mut self) -> AttemptOutcome<T::Chunk> {
        let mut head: Option<ResponseHead> = None;
        let mut body: Vec<T::Chunk> = Vec::new();
        while let Some(event) = self.events.recv().await {
            match event {
                AttemptEvent::Response(h) => head = Some(h),
                AttemptEvent::Chunk(chunk) => body.push(chunk),
                AttemptEvent::Complete => break,
                AttemptEvent::Error(err) => return AttemptOutcome::TransportFailure(err),
            }
        }
        match head {
            Some(response) => AttemptOutcome::Responded { response, body },
            // Channel closed (or completed) without ever producing a head.
            None => AttemptOutcome::TransportFailure(TransportError::new(
                "transport ended without a response",
            )),
        }
    }
}
