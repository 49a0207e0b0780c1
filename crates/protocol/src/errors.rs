//! Error taxonomy for one request/response cycle.
//!
//! [`BuildError`] covers requests that could not be constructed (no I/O was
//! attempted). [`ExecutionError`] covers exchanges that failed once handed to
//! the transport, and keeps the [`ResponseDescriptor`] whenever the server
//! answered. [`SendError`] is the union returned by the generic send path and
//! [`SourceOpsError`] adds payload decoding for dialect operations.
//!
//! Nothing in this workspace retries. [`RetryPolicy`] is a classification
//! hint for callers that implement their own retry loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ApiErrorBody, ResponseDescriptor, StatusCode};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable`: network failures, 429 and 5xx responses.
/// - `NonRetryable`: malformed requests, 4xx rejections, cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt, derived from a
        /// `Retry-After` header when present.
        after: Option<Duration>,
    },
    /// The operation must not be retried as-is.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Build errors
// ---------------------------------------------------------------------------

/// The outbound request could not be constructed. No I/O was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The endpoint path could not be resolved against the base URL.
    #[error("invalid endpoint path '{path}': {reason}")]
    InvalidPath {
        /// The path as supplied.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The request body could not be serialised.
    #[error("request body could not be serialised: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

/// What went wrong while executing a built request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionErrorKind {
    /// The request could not be delivered or no response head arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("server responded with status {status}: {message}")]
    Status {
        status: StatusCode,
        /// Structured error payload, when the body parsed as one.
        api_error: Option<ApiErrorBody>,
        /// The API error rendered as text, or the raw body for textual responses.
        message: String,
    },

    /// The response head arrived but streaming the body failed.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The caller cancelled the request while it was queued or in flight.
    #[error("request cancelled")]
    Cancelled,
}

/// An HTTP exchange failed after the request was built.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ExecutionError {
    kind: ExecutionErrorKind,
    response: Option<ResponseDescriptor>,
}

impl ExecutionError {
    /// Creates an error for an exchange that produced no response.
    pub fn new(kind: ExecutionErrorKind) -> Self {
        Self {
            kind,
            response: None,
        }
    }

    /// Creates an error that keeps the response the server sent.
    pub fn with_response(kind: ExecutionErrorKind, response: ResponseDescriptor) -> Self {
        Self {
            kind,
            response: Some(response),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ExecutionErrorKind::Cancelled)
    }

    pub fn kind(&self) -> &ExecutionErrorKind {
        &self.kind
    }

    /// Returns the response descriptor, if the server answered at all.
    pub fn response(&self) -> Option<&ResponseDescriptor> {
        self.response.as_ref()
    }

    /// Returns the response status, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Returns the structured API error carried by a non-2xx response.
    pub fn api_error(&self) -> Option<&ApiErrorBody> {
        match &self.kind {
            ExecutionErrorKind::Status { api_error, .. } => api_error.as_ref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ExecutionErrorKind::Cancelled)
    }

    /// Classifies the failure for callers that retry on their own.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.kind {
            ExecutionErrorKind::Network(_) | ExecutionErrorKind::Body(_) => {
                RetryPolicy::Retryable { after: None }
            }
            ExecutionErrorKind::Status { status, .. }
                if status.is_server_error() || status.as_u16() == 429 =>
            {
                let after = self
                    .response
                    .as_ref()
                    .and_then(|r| r.header("retry-after"))
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                RetryPolicy::Retryable { after }
            }
            ExecutionErrorKind::Status { .. } | ExecutionErrorKind::Cancelled => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Send errors
// ---------------------------------------------------------------------------

/// Failure of one generic send: either the request never left, or the
/// exchange failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    #[error("failed to build request: {0}")]
    Build(#[from] BuildError),

    #[error("request failed: {0}")]
    Execution(#[from] ExecutionError),
}

impl SendError {
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns the response descriptor, if the request was sent and answered.
    pub fn response(&self) -> Option<&ResponseDescriptor> {
        match self {
            Self::Build(_) => None,
            Self::Execution(e) => e.response(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dialect operation errors
// ---------------------------------------------------------------------------

/// Failure of a dialect-specific operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceOpsError {
    #[error(transparent)]
    Send(#[from] SendError),

    /// The service answered 2xx but the payload did not match the expected shape.
    #[error("unexpected response payload: {0}")]
    Decode(String),
}

impl From<BuildError> for SourceOpsError {
    fn from(err: BuildError) -> Self {
        Self::Send(SendError::Build(err))
    }
}

impl From<ExecutionError> for SourceOpsError {
    fn from(err: ExecutionError) -> Self {
        Self::Send(SendError::Execution(err))
    }
}
