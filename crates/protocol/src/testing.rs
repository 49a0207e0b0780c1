//! In-memory [`Transport`] for tests of transport consumers.
//!
//! [`RecordingTransport`] honours the same contract as a real transport
//! (serialised execution, cancellation, non-2xx statuses as errors) and
//! records every request it executes together with its entry/exit instants,
//! so tests can assert call counts, routing and non-overlap.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    ApiErrorBody, BuildError, EndpointPath, ExecutionError, ExecutionErrorKind, HttpMethod,
    OutboundRequest, RequestId, ResponseBody, ResponseDescriptor, StatusCode, Transport,
};

/// One scripted outcome of [`RecordingTransport::execute`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// The server answers with `status` and `body`.
    Respond {
        status: u16,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
    },
    /// No response arrives.
    NetworkFailure(String),
}

impl ScriptedReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            body: body.as_bytes().to_vec(),
            headers: vec![("content-type".to_owned(), "application/json".to_owned())],
        }
    }
}

/// Entry and exit instants of one execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionInterval {
    pub entered: Instant,
    pub exited: Instant,
}

impl ExecutionInterval {
    /// Returns `true` if the two intervals share any instant.
    pub fn overlaps(&self, other: &ExecutionInterval) -> bool {
        self.entered < other.exited && other.entered < self.exited
    }
}

/// Scripted, counting, serialising fake transport.
#[derive(Debug)]
pub struct RecordingTransport {
    base_url: String,
    gate: tokio::sync::Mutex<()>,
    delay: Duration,
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    execute_calls: AtomicUsize,
    requests: Mutex<Vec<OutboundRequest>>,
    intervals: Mutex<Vec<ExecutionInterval>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Creates a transport that answers every request with `200 {}`.
    pub fn new() -> Self {
        Self {
            base_url: "http://metadata.test".to_owned(),
            gate: tokio::sync::Mutex::new(()),
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedReply::json(200, "{}"),
            execute_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            intervals: Mutex::new(Vec::new()),
        }
    }

    /// Holds each execution open for `delay` while the gate is held.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers every unscripted request with `reply`.
    #[must_use]
    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Queues `reply` for the next unanswered execution.
    pub fn push_reply(&self, reply: ScriptedReply) {
        lock(&self.script).push_back(reply);
    }

    /// Number of times [`Transport::execute`] was entered.
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// Requests executed so far, in completion order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        lock(&self.requests).clone()
    }

    /// Execution intervals recorded so far, in completion order.
    pub fn intervals(&self) -> Vec<ExecutionInterval> {
        lock(&self.intervals).clone()
    }

    fn next_reply(&self) -> ScriptedReply {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl Transport for RecordingTransport {
    fn new_request<B>(
        &self,
        method: HttpMethod,
        path: &EndpointPath,
        body: &B,
    ) -> Result<OutboundRequest, BuildError>
    where
        B: Serialize + ?Sized,
    {
        if path.as_str().contains("://") || path.as_str().contains(char::is_whitespace) {
            return Err(BuildError::InvalidPath {
                path: path.to_string(),
                reason: "not a relative path".to_owned(),
            });
        }
        let body = serde_json::to_vec(body).map_err(|e| BuildError::Serialization(e.to_string()))?;
        Ok(OutboundRequest {
            method,
            url: format!("{}/{}", self.base_url, path.as_str().trim_start_matches('/')),
            path: path.clone(),
            body,
            request_id: RequestId::new_random(),
            headers: Vec::new(),
        })
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        request: OutboundRequest,
        sink: &mut ResponseBody,
    ) -> Result<ResponseDescriptor, ExecutionError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutionError::cancelled()),
            guard = self.gate.lock() => guard,
        };
        let entered = Instant::now();

        if !self.delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutionError::cancelled()),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        let request_id = request.request_id;
        let reply = self.next_reply();
        lock(&self.requests).push(request);

        let outcome = match reply {
            ScriptedReply::NetworkFailure(message) => {
                Err(ExecutionError::new(ExecutionErrorKind::Network(message)))
            }
            ScriptedReply::Respond {
                status,
                body,
                headers,
            } => {
                let mut response = ResponseDescriptor::new(StatusCode::new(status), request_id);
                response.headers = headers;
                sink.extend_from_slice(&body);
                if response.status.is_success() {
                    Ok(response)
                } else {
                    let api_error = serde_json::from_slice::<ApiErrorBody>(&body).ok();
                    let message = api_error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
                    Err(ExecutionError::with_response(
                        ExecutionErrorKind::Status {
                            status: response.status,
                            api_error,
                            message,
                        },
                        response,
                    ))
                }
            }
        };

        lock(&self.intervals).push(ExecutionInterval {
            entered,
            exited: Instant::now(),
        });
        outcome
    }
}
