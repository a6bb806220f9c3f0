//! Scripted in-memory transport for integration tests.
//!
//! Each call to `start` plays the next step of the script (the last step
//! repeats forever), pre-queueing the attempt's events on a channel. Handles
//! count how they were torn down so tests can assert on abort behavior.

use reissue::{AttemptEvent, AttemptHandle, ResponseHead, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What one scripted attempt does.
#[derive(Clone)]
pub enum Script<C> {
    /// Fail before producing a response.
    Fail(&'static str),
    /// Respond, deliver the body, complete.
    Respond { status: u16, chunks: Vec<C> },
    /// Respond, deliver the body, then die mid-stream.
    RespondThenError {
        status: u16,
        chunks: Vec<C>,
        error: &'static str,
    },
    /// Produce nothing until aborted.
    Hang,
}

/// Teardown bookkeeping shared between the transport and its handles.
#[derive(Default)]
pub struct Counters {
    pub started: AtomicU32,
    pub closed: AtomicU32,
    pub cancelled: AtomicU32,
}

impl Counters {
    pub fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> u32 {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Teardowns of either flavor.
    pub fn aborts(&self) -> u32 {
        self.closed() + self.cancelled()
    }
}

pub struct FakeTransport<C> {
    script: Mutex<VecDeque<Script<C>>>,
    counters: Arc<Counters>,
    native_cancel: bool,
}

impl<C: Clone + Send + 'static> FakeTransport<C> {
    pub fn new(steps: impl IntoIterator<Item = Script<C>>) -> Self {
        let script: VecDeque<_> = steps.into_iter().collect();
        assert!(!script.is_empty(), "script must not be empty");
        Self {
            script: Mutex::new(script),
            counters: Arc::new(Counters::default()),
            native_cancel: false,
        }
    }

    /// Same, but handles advertise transport-native cancellation.
    pub fn with_native_cancel(steps: impl IntoIterator<Item = Script<C>>) -> Self {
        let mut transport = Self::new(steps);
        transport.native_cancel = true;
        transport
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    fn next_step(&self) -> Script<C> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

pub struct FakeHandle<C> {
    counters: Arc<Counters>,
    native_cancel: bool,
    // Held open so a hanging attempt's channel stays alive until teardown.
    keep_open: Option<mpsc::Sender<AttemptEvent<C>>>,
}

impl<C: Send + 'static> AttemptHandle for FakeHandle<C> {
    fn cancel(&mut self) -> bool {
        if !self.native_cancel {
            return false;
        }
        self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        self.keep_open = None;
        true
    }

    fn close(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.keep_open = None;
    }
}

impl<C: Clone + Send + 'static> Transport for FakeTransport<C> {
    type Request = String;
    type Chunk = C;
    type Handle = FakeHandle<C>;

    fn start(&self, _request: &String) -> (mpsc::Receiver<AttemptEvent<C>>, FakeHandle<C>) {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(32);
        let mut keep_open = None;
        match self.next_step() {
            Script::Fail(message) => {
                let _ = tx.try_send(AttemptEvent::Error(TransportError::new(message)));
            }
            Script::Respond { status, chunks } => {
                let _ = tx.try_send(AttemptEvent::Response(ResponseHead::new(status)));
                for chunk in chunks {
                    let _ = tx.try_send(AttemptEvent::Chunk(chunk));
                }
                let _ = tx.try_send(AttemptEvent::Complete);
            }
            Script::RespondThenError {
                status,
                chunks,
                error,
            } => {
                let _ = tx.try_send(AttemptEvent::Response(ResponseHead::new(status)));
                for chunk in chunks {
                    let _ = tx.try_send(AttemptEvent::Chunk(chunk));
                }
                let _ = tx.try_send(AttemptEvent::Error(TransportError::new(error)));
            }
            Script::Hang => keep_open = Some(tx),
        }
        (
            rx,
            FakeHandle {
                counters: Arc::clone(&self.counters),
                native_cancel: self.native_cancel,
                keep_open,
            },
        )
    }
}

/// Shorthand for byte-chunk scripts.
pub fn respond(status: u16, chunks: &[&[u8]]) -> Script<Vec<u8>> {
    Script::Respond {
        status,
        chunks: chunks.iter().map(|c| c.to_vec()).collect(),
    }
}
