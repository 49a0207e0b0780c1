//! Shared value types for one HTTP exchange with the metadata service.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the data that flows through a request/response cycle: the built request,
//! the response descriptor, and the response body buffer.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EndpointPath, RequestId};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// A fully built request, ready to be handed to [`crate::Transport::execute`].
///
/// Produced by [`crate::Transport::new_request`]. The request body has already
/// been serialised; the caller's body value is not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// Method to send with.
    pub method: HttpMethod,
    /// Absolute URL the request targets (base URL joined with `path`).
    pub url: String,
    /// Endpoint path the URL was resolved from.
    pub path: EndpointPath,
    /// Serialised JSON payload.
    pub body: Vec<u8>,
    /// Correlation identifier, sent as `x-request-id`.
    pub request_id: RequestId,
    /// Headers specific to this request, in addition to the transport defaults.
    pub headers: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// HTTP status code of a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusCode(u16);

impl StatusCode {
    /// Creates a [`StatusCode`] from a raw integer.
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the underlying integer value.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Returns `true` for 5xx statuses.
    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------

/// Metadata about one completed HTTP exchange.
///
/// Returned to the caller on success, and attached to execution errors
/// whenever the server answered, so "never sent" can be told apart from
/// "sent but rejected".
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    /// Response status.
    pub status: StatusCode,
    /// Response headers in arrival order. Names are lower-case.
    pub headers: Vec<(String, String)>,
    /// Identifier of the request this response answers.
    pub request_id: RequestId,
    /// When the response head was received.
    pub received_at: Timestamp,
}

impl ResponseDescriptor {
    /// Creates a descriptor with no headers, stamped with the current time.
    pub fn new(status: StatusCode, request_id: RequestId) -> Self {
        Self {
            status,
            headers: Vec::new(),
            request_id,
            received_at: Timestamp::now(),
        }
    }

    /// Returns the first value of the header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` when the `content-type` header names a textual body.
    pub fn has_text_content(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.contains("text"))
    }
}

// ---------------------------------------------------------------------------

/// In-memory sink for a response payload.
///
/// Written by the transport while a request executes. Handed to the caller
/// only when the exchange succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBody(Vec<u8>);

impl ResponseBody {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of payload.
    pub fn extend_from_slice(&mut self, chunk: &[u8]) {
        self.0.extend_from_slice(chunk);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the payload as UTF-8, or `None` if it is not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Decodes the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

// ---------------------------------------------------------------------------

/// A successful request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub response: ResponseDescriptor,
    pub body: ResponseBody,
}

impl Exchange {
    /// Splits the exchange into its descriptor and body.
    pub fn into_parts(self) -> (ResponseDescriptor, ResponseBody) {
        (self.response, self.body)
    }
}

// ---------------------------------------------------------------------------

/// Structured error payload returned by the metadata service on non-2xx
/// responses, e.g. `{"code":"access-denied","error":"...","path":"$"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code (e.g. `"access-denied"`, `"postgres-error"`).
    pub code: String,
    /// Human-readable message.
    pub error: String,
    /// JSON path of the offending request field.
    #[serde(default)]
    pub path: String,
    /// Backend-specific detail, when the service exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Returns `true` when the service rejected the request's credentials.
    pub fn is_access_denied(&self) -> bool {
        self.code == "access-denied"
    }
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.code, self.error)
        } else {
            write!(f, "[{}] {} ({})", self.code, self.error, self.path)
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::ok(200, true)]
    #[case::no_content(204, true)]
    #[case::redirect(302, false)]
    #[case::bad_request(400, false)]
    #[case::server_error(500, false)]
    fn status_code_success_range(#[case] code: u16, #[case] expected: bool) {
        assert_eq!(StatusCode::new(code).is_success(), expected);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut descriptor = ResponseDescriptor::new(StatusCode::new(200), RequestId::new_random());
        descriptor
            .headers
            .push(("content-type".to_owned(), "text/plain; charset=utf-8".to_owned()));

        assert_eq!(
            descriptor.header("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(descriptor.has_text_content());
        assert_eq!(descriptor.header("x-missing"), None);
    }

    #[test]
    fn response_body_decodes_json() {
        let mut body = ResponseBody::new();
        body.extend_from_slice(br#"{"result":"#);
        body.extend_from_slice(br#"[["1"]]}"#);

        let value: serde_json::Value = body.json().expect("valid json");
        assert_eq!(value["result"][0][0], "1");
        assert_eq!(body.as_str(), Some(r#"{"result":[["1"]]}"#));
    }

    #[test]
    fn api_error_body_tolerates_missing_path() {
        let parsed: ApiErrorBody =
            serde_json::from_str(r#"{"code":"access-denied","error":"invalid x-hasura-admin-secret"}"#)
                .expect("deserialize");

        assert!(parsed.is_access_denied());
        assert_eq!(parsed.to_string(), "[access-denied] invalid x-hasura-admin-secret");
    }
}
