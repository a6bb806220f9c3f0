//! The retry orchestrator: drives attempts, consults the policy, schedules
//! delays, and delivers exactly one outcome per logical request.

mod run;
mod session;

use crate::config::RetryConfig;
use crate::error::RequestError;
use crate::policy::RetryPolicy;
use crate::relay::StreamEvent;
use crate::transport::{ResponseHead, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Executes one logical request against an injected [`Transport`], retrying
/// per its [`RetryConfig`] and [`RetryPolicy`].
///
/// Cheap to clone; clones share the transport and configuration. Two call
/// shapes are offered: [`execute`](Retrier::execute) resolves once with the
/// committed outcome, [`stream`](Retrier::stream) delivers it as a live
/// event stream that hides discarded attempts.
pub struct Retrier<T: Transport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Transport> {
    transport: T,
    config: RetryConfig,
    policy: RetryPolicy,
}

impl<T: Transport> Clone for Retrier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Retrier<T> {
    /// Retrier with default configuration and the default retry policy.
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, RetryConfig::default(), RetryPolicy::default())
    }

    pub fn with_config(transport: T, config: RetryConfig) -> Self {
        Self::with_policy(transport, config, RetryPolicy::default())
    }

    pub fn with_policy(transport: T, config: RetryConfig, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                policy,
            }),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }
}

/// Final outcome of a buffered request: the committed attempt's response
/// and its collected body.
///
/// When a retry budget ran out, `response` is the last one the policy
/// rejected: budget exhaustion surfaces the real response, never a
/// synthesized error.
#[derive(Debug)]
pub struct Completed<C> {
    pub response: ResponseHead,
    pub body: Vec<C>,
}

/// Consumer side of a streaming request.
///
/// Events arrive through [`recv`](Self::recv) in the order documented on
/// [`StreamEvent`]. [`abort`](Self::abort) cancels the in-flight attempt and
/// any scheduled retry; the stream then ends without `Response`/`Complete`.
/// Dropping the stream aborts it as well.
pub struct RequestStream<C> {
    events: mpsc::Receiver<StreamEvent<C>>,
    cancel: CancellationToken,
}

impl<C> RequestStream<C> {
    /// Next event, or `None` once the stream is over.
    pub async fn recv(&mut self) -> Option<StreamEvent<C>> {
        self.events.recv().await
    }

    /// Cancel the request. Idempotent; no further attempts are scheduled
    /// and no terminal event is emitted.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream into a buffered result. `None` means the request
    /// was aborted before an attempt committed.
    pub async fn collect(mut self) -> Option<Result<Completed<C>, RequestError>> {
        let mut response: Option<ResponseHead> = None;
        let mut body = Vec::new();
        while let Some(event) = self.recv().await {
            match event {
                StreamEvent::Request { .. } => {}
                StreamEvent::Response(head) => response = Some(head),
                StreamEvent::Chunk(chunk) => body.push(chunk),
                StreamEvent::Complete => {
                    return response.map(|response| Ok(Completed { response, body }))
                }
                StreamEvent::Error(err) => return Some(Err(err)),
            }
        }
        None
    }

    pub(crate) fn new(events: mpsc::Receiver<StreamEvent<C>>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }
}

impl<C> Drop for RequestStream<C> {
    fn drop(&mut self) {
        // A walked-away consumer should not keep attempts running.
        self.cancel.cancel();
    }
}
