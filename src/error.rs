//! Error types that cross the crate boundary.

use std::error::Error;

/// Failure reported by the transport before a response was obtained
/// (DNS failure, connection reset, channel torn down mid-handshake).
///
/// Carries the transport's own message and, when available, the underlying
/// error as `source()` so callers can still downcast it.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Terminal error for one logical request.
///
/// Budget exhaustion is never synthesized as its own error: when the
/// transport retry budget runs out, the *last* [`TransportError`] surfaces
/// here unchanged. A response the policy rejected is not an error at all;
/// it crosses the boundary as a normal completion.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The transport failed and no further attempts are allowed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The caller aborted the request before it committed.
    #[error("request aborted")]
    Aborted,
}
