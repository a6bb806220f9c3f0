//! The injected transport capability and its per-attempt surface.
//!
//! The crate never performs I/O itself: a [`Transport`] is handed in and
//! invoked once per physical attempt. Each attempt reports progress as
//! tagged [`AttemptEvent`]s on a bounded channel and can be torn down early
//! through its [`AttemptHandle`].

use crate::error::TransportError;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Response metadata delivered before the body.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
        }
    }
}

/// Signals one physical attempt can produce, in wire order: at most one
/// `Response`, then body chunks, then one terminal `Complete` or `Error`.
#[derive(Debug)]
pub enum AttemptEvent<C> {
    Response(ResponseHead),
    Chunk(C),
    Complete,
    Error(TransportError),
}

/// Everything one attempt produced, normalized. Exactly one attempt yields
/// exactly one outcome.
#[derive(Debug)]
pub enum AttemptOutcome<C> {
    /// The transport failed before completing a response.
    TransportFailure(TransportError),
    /// A structurally complete response, whether the policy accepts it or not.
    Responded { response: ResponseHead, body: Vec<C> },
}

/// Cancellation surface of one in-flight attempt.
///
/// Transports differ in what they offer: some have native cancellation,
/// others can only tear the underlying resource down. The executor probes
/// [`cancel`](Self::cancel) first and falls back to [`close`](Self::close).
pub trait AttemptHandle: Send + 'static {
    /// Transport-native cancellation. Returns true when the transport
    /// handled it. Default: not offered.
    fn cancel(&mut self) -> bool {
        false
    }

    /// Tear down the attempt's underlying resource. Must be safe to call
    /// after the attempt already completed.
    fn close(&mut self);
}

/// The injected request executor.
///
/// One call to [`start`](Self::start) performs one physical attempt for the
/// given request options; the options are passed through untouched on every
/// retry. The returned receiver carries the attempt's events and the handle
/// its cancellation surface.
pub trait Transport: Send + Sync + 'static {
    /// Request options, opaque to this crate.
    type Request: Send + Sync + 'static;
    /// Body item: raw byte buffers, or discrete values for transports that
    /// stream objects instead of bytes.
    type Chunk: Send + 'static;
    type Handle: AttemptHandle;

    fn start(
        &self,
        request: &Self::Request,
    ) -> (mpsc::Receiver<AttemptEvent<Self::Chunk>>, Self::Handle);
}
