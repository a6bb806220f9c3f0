//! `reissue` executes a single logical network request through as many
//! physical attempts as its configuration allows, deciding after each
//! attempt (transport failure, or response inspection) whether to retry
//! and after how long.
//!
//! The actual I/O is an injected [`Transport`] capability; this crate owns
//! the retry/backoff decisions and the two delivery shapes: a buffered
//! result resolved exactly once ([`Retrier::execute`]), or an event stream
//! that looks like one uninterrupted request even when earlier attempts were
//! silently discarded ([`Retrier::stream`]).

pub mod backoff;
pub mod config;
pub mod error;
pub mod policy;
pub mod relay;
pub mod retrier;
pub mod transport;

mod executor;

pub use backoff::Backoff;
pub use config::RetryConfig;
pub use error::{RequestError, TransportError};
pub use policy::{default_should_retry, Charge, RetryPolicy, SessionSnapshot, Verdict};
pub use relay::StreamEvent;
pub use retrier::{Completed, RequestStream, Retrier};
pub use transport::{AttemptEvent, AttemptHandle, AttemptOutcome, ResponseHead, Transport};
