//! reqwest-backed [`Transport`].

use async_trait::async_trait;
use protocol::{
    ApiErrorBody, BuildError, EndpointPath, ExecutionError, ExecutionErrorKind, HttpMethod,
    OutboundRequest, RequestId, ResponseBody, ResponseDescriptor, StatusCode, Transport,
};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ConfigError, TransportConfig};

/// Header carrying the [`RequestId`] of every outbound request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP transport that executes at most one request at a time.
///
/// The gate is a [`tokio::sync::Mutex`], which queues waiters in FIFO order.
/// It is held from sending the request until the last body chunk has been
/// copied into the caller's sink.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    gate: Mutex<()>,
}

impl HttpTransport {
    /// Builds a transport from a validated configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        let base_url = config.parsed_base_url()?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in config.default_headers()? {
            default_headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .default_headers(default_headers)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            gate: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &EndpointPath) -> Result<Url, BuildError> {
        let raw = path.as_str();
        let invalid = |reason: String| BuildError::InvalidPath {
            path: raw.to_owned(),
            reason,
        };
        if raw.contains("://") {
            return Err(invalid("expected a path relative to the base URL".to_owned()));
        }
        let relative = raw.trim_start_matches('/');
        if relative.is_empty() {
            return Err(invalid("path is empty".to_owned()));
        }
        self.base_url
            .join(relative)
            .map_err(|e| invalid(e.to_string()))
    }

    async fn exchange(
        &self,
        request: OutboundRequest,
        sink: &mut ResponseBody,
    ) -> Result<ResponseDescriptor, ExecutionError> {
        let request_id = request.request_id;
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id.to_string());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| ExecutionError::new(ExecutionErrorKind::Network(e.to_string())))?;

        let descriptor = describe(&response, request_id);

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => sink.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    return Err(ExecutionError::with_response(
                        ExecutionErrorKind::Body(e.to_string()),
                        descriptor,
                    ))
                }
            }
        }

        if !descriptor.status.is_success() {
            return Err(status_error(descriptor, sink));
        }
        Ok(descriptor)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn new_request<B>(
        &self,
        method: HttpMethod,
        path: &EndpointPath,
        body: &B,
    ) -> Result<OutboundRequest, BuildError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(path)?;
        let body = serde_json::to_vec(body).map_err(|e| BuildError::Serialization(e.to_string()))?;

        Ok(OutboundRequest {
            method,
            url: url.into(),
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
        let request_id = request.request_id;

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%request_id, "request cancelled while queued");
                return Err(ExecutionError::cancelled());
            }
            guard = self.gate.lock() => guard,
        };
        debug!(%request_id, method = %request.method, url = %request.url, "executing request");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::cancelled()),
            outcome = self.exchange(request, sink) => outcome,
        };

        match &outcome {
            Ok(response) => debug!(%request_id, status = %response.status, "request completed"),
            Err(e) if e.is_cancelled() => debug!(%request_id, "request cancelled in flight"),
            Err(e) => warn!(%request_id, status = ?e.status(), error = %e, "request failed"),
        }
        outcome
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn describe(response: &reqwest::Response, request_id: RequestId) -> ResponseDescriptor {
    let mut descriptor = ResponseDescriptor::new(StatusCode::new(response.status().as_u16()), request_id);
    descriptor.headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    descriptor
}

/// Builds the error for a non-2xx response. Textual bodies are kept verbatim;
/// anything else is parsed as the service's structured error when possible.
fn status_error(descriptor: ResponseDescriptor, body: &ResponseBody) -> ExecutionError {
    let raw = String::from_utf8_lossy(body.as_bytes()).into_owned();
    let api_error = if descriptor.has_text_content() {
        None
    } else {
        body.json::<ApiErrorBody>().ok()
    };
    let message = api_error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or(raw);

    ExecutionError::with_response(
        ExecutionErrorKind::Status {
            status: descriptor.status,
            api_error,
            message,
        },
        descriptor,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use protocol::RetryPolicy;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn endpoint() -> EndpointPath {
        EndpointPath::new("v2/query").expect("non-empty")
    }

    fn transport_for(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&TransportConfig::new(server.uri())).expect("valid config")
    }

    async fn post(
        transport: &HttpTransport,
        body: serde_json::Value,
    ) -> (Result<ResponseDescriptor, ExecutionError>, ResponseBody) {
        let request = transport
            .new_request(HttpMethod::Post, &endpoint(), &body)
            .expect("build");
        let mut sink = ResponseBody::new();
        let outcome = transport
            .execute(&CancellationToken::new(), request, &mut sink)
            .await;
        (outcome, sink)
    }

    #[tokio::test]
    async fn success_streams_body_into_sink() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/query"))
            .and(body_json(serde_json::json!({"type": "run_sql", "args": {"sql": "select 1"}})))
            .and(header("content-type", "application/json"))
            .and(header_exists(REQUEST_ID_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"result":[["1"]]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let (outcome, sink) = post(
            &transport,
            serde_json::json!({"type": "run_sql", "args": {"sql": "select 1"}}),
        )
        .await;

        let response = outcome.expect("success");
        assert_eq!(response.status.as_u16(), 200);
        assert_eq!(sink.as_str(), Some(r#"{"result":[["1"]]}"#));
    }

    #[tokio::test]
    async fn admin_secret_and_extra_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-hasura-admin-secret", "s3cret"))
            .and(header("x-hasura-role", "admin"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = TransportConfig::new(server.uri())
            .with_admin_secret("s3cret")
            .with_header("x-hasura-role", "admin");
        let transport = HttpTransport::new(&config).expect("valid config");

        let (outcome, _) = post(&transport, serde_json::json!({})).await;
        outcome.expect("success");
    }

    #[tokio::test]
    async fn json_error_body_is_parsed_and_descriptor_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "code": "postgres-error",
                "error": "query execution failed",
                "path": "$.args"
            })))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let (outcome, _) = post(&transport, serde_json::json!({})).await;
        let err = outcome.expect_err("server error");

        assert_eq!(err.status().map(StatusCode::as_u16), Some(500));
        let api_error = err.api_error().expect("structured error");
        assert_eq!(api_error.code, "postgres-error");
        assert!(matches!(err.retry_policy(), RetryPolicy::Retryable { .. }));
    }

    #[tokio::test]
    async fn text_error_body_is_kept_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_raw("bad things happened", "text/plain"),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let (outcome, _) = post(&transport, serde_json::json!({})).await;
        let err = outcome.expect_err("client error");

        assert!(err.api_error().is_none());
        match err.kind() {
            ExecutionErrorKind::Status { message, .. } => {
                assert_eq!(message, "bad things happened");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error_without_descriptor() {
        let transport =
            HttpTransport::new(&TransportConfig::new("http://127.0.0.1:9")).expect("valid config");

        let (outcome, sink) = post(&transport, serde_json::json!({})).await;
        let err = outcome.expect_err("connection refused");

        assert!(matches!(err.kind(), ExecutionErrorKind::Network(_)));
        assert!(err.response().is_none());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let request = transport
            .new_request(HttpMethod::Post, &endpoint(), &serde_json::json!({}))
            .expect("build");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = transport
            .execute(&cancel, request, &mut ResponseBody::new())
            .await
            .expect_err("cancelled");

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn concurrent_executions_are_serialised() {
        let delay = Duration::from_millis(150);
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(delay))
            .expect(3)
            .mount(&server)
            .await;

        let transport = Arc::new(transport_for(&server));
        let started = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let transport = Arc::clone(&transport);
                tokio::spawn(async move { post(&transport, serde_json::json!({})).await.0 })
            })
            .collect();
        for handle in handles {
            handle.await.expect("join").expect("success");
        }

        // Three exchanges that could not overlap take at least three delays.
        assert!(started.elapsed() >= delay * 3);
    }

    #[test]
    fn endpoint_path_extends_base_path() {
        let transport = HttpTransport::new(&TransportConfig::new("https://meta.example.com/api"))
            .expect("valid config");
        let request = transport
            .new_request(HttpMethod::Post, &endpoint(), &serde_json::json!({}))
            .expect("build");

        assert_eq!(request.url, "https://meta.example.com/api/v2/query");
        assert_eq!(request.path, endpoint());
    }

    #[test]
    fn absolute_url_path_is_a_build_error() {
        let transport = HttpTransport::new(&TransportConfig::default()).expect("valid config");
        let path = EndpointPath::new("https://elsewhere.example.com/v2/query").expect("non-empty");

        let err = transport
            .new_request(HttpMethod::Post, &path, &serde_json::json!({}))
            .expect_err("invalid path");
        assert!(matches!(err, BuildError::InvalidPath { .. }));
    }

    #[test]
    fn unserialisable_body_is_a_build_error() {
        use std::collections::HashMap;

        let transport = HttpTransport::new(&TransportConfig::default()).expect("valid config");
        let mut body = HashMap::new();
        body.insert((1, 2), "tuple keys cannot be JSON object keys");

        let err = transport
            .new_request(HttpMethod::Post, &endpoint(), &body)
            .expect_err("unserialisable");
        assert!(matches!(err, BuildError::Serialization(_)));
    }
}
