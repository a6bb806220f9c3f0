//! Stream relay: hold an attempt's output until its verdict is known, then
//! splice it into the external stream or drop it.

use crate::error::RequestError;
use crate::executor::RunningAttempt;
use crate::transport::{ResponseHead, Transport};
use tokio::sync::mpsc;

/// Tagged events on the external stream of a logical request.
///
/// For any request the stream emits zero or more `Request` events (one per
/// physical attempt actually started), then on commit one `Response`, the
/// relayed body, and one `Complete`. On total failure one `Error` replaces
/// `Response`/`Complete`. An aborted request's stream ends
/// with none of the terminal events.
#[derive(Debug)]
pub enum StreamEvent<C> {
    /// A physical attempt started, including attempts later discarded.
    Request { attempt: u32 },
    /// The committed attempt's response metadata.
    Response(ResponseHead),
    /// One item of the committed attempt's body.
    Chunk(C),
    /// The committed attempt finished cleanly.
    Complete,
    /// Terminal failure: transport budget exhausted, legacy short-circuit,
    /// or a post-commit transport error relayed verbatim.
    Error(RequestError),
}

/// Relays exactly one attempt at a time into the external stream.
///
/// Before the verdict, chunks land in an internal sink and nothing is
/// visible downstream. `discard` drops the sink and tears the attempt down;
/// `commit` flushes it in arrival order and switches to live forwarding.
/// Every send reports whether the consumer is still there; once it is gone
/// the driver stops, which also suppresses anything a discarded attempt
/// might still produce.
pub(crate) struct StreamRelay<C> {
    out: mpsc::Sender<StreamEvent<C>>,
    sink: Vec<C>,
    committed: bool,
}

impl<C> StreamRelay<C> {
    pub(crate) fn new(out: mpsc::Sender<StreamEvent<C>>) -> Self {
        Self {
            out,
            sink: Vec::new(),
            committed: false,
        }
    }

    /// Announce a physical attempt. Returns false when the consumer is gone.
    pub(crate) async fn announce(&mut self, attempt: u32) -> bool {
        self.out
            .send(StreamEvent::Request { attempt })
            .await
            .is_ok()
    }

    /// Bind the relay to a fresh attempt. The previous sink must already be
    /// discarded or committed.
    pub(crate) fn begin_attempt(&mut self) {
        debug_assert!(self.sink.is_empty() && !self.committed);
    }

    /// Hold a chunk that arrived before the attempt's verdict.
    pub(crate) fn capture(&mut self, chunk: C) {
        debug_assert!(!self.committed);
        self.sink.push(chunk);
    }

    /// Drop everything the attempt produced and tear down its I/O.
    pub(crate) fn discard<T>(&mut self, attempt: &mut RunningAttempt<T>)
    where
        T: Transport<Chunk = C>,
    {
        self.sink.clear();
        attempt.abort();
    }

    /// Splice the attempt into the external stream: response head first,
    /// then captured chunks in arrival order. Subsequent chunks go through
    /// [`forward`](Self::forward) with no further buffering.
    pub(crate) async fn commit(&mut self, response: ResponseHead) -> bool {
        if self.out.send(StreamEvent::Response(response)).await.is_err() {
            return false;
        }
        for chunk in self.sink.drain(..) {
            if self.out.send(StreamEvent::Chunk(chunk)).await.is_err() {
                return false;
            }
        }
        self.committed = true;
        true
    }

    /// Relay a live chunk of the committed attempt.
    pub(crate) async fn forward(&mut self, chunk: C) -> bool {
        debug_assert!(self.committed);
        self.out.send(StreamEvent::Chunk(chunk)).await.is_ok()
    }

    /// Forward the committed attempt's completion signal.
    pub(crate) async fn complete(&mut self) -> bool {
        self.out.send(StreamEvent::Complete).await.is_ok()
    }

    /// End the stream with a terminal error.
    pub(crate) async fn fail(&mut self, error: RequestError) -> bool {
        self.out.send(StreamEvent::Error(error)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_flushes_captured_chunks_in_order() {
        let (tx, mut rx) = mpsc::channel::<StreamEvent<Vec<u8>>>(8);
        let mut relay = StreamRelay::new(tx);
        relay.begin_attempt();
        relay.capture(b"one".to_vec());
        relay.capture(b"two".to_vec());
        assert!(relay.commit(ResponseHead::new(200)).await);
        assert!(relay.forward(b"three".to_vec()).await);
        assert!(relay.complete().await);

        assert!(matches!(
            rx.recv().await,
            Some(StreamEvent::Response(head)) if head.status == 200
        ));
        for expected in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            match rx.recv().await {
                Some(StreamEvent::Chunk(c)) => assert_eq!(c, expected),
                other => panic!("expected chunk, got {:?}", other),
            }
        }
        assert!(matches!(rx.recv().await, Some(StreamEvent::Complete)));
    }

    #[tokio::test]
    async fn sends_report_a_gone_consumer() {
        let (tx, rx) = mpsc::channel::<StreamEvent<Vec<u8>>>(8);
        let mut relay = StreamRelay::new(tx);
        drop(rx);
        assert!(!relay.announce(1).await);
        assert!(!relay.commit(ResponseHead::new(200)).await);
    }
}
