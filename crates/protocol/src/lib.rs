//! Query domain for metaq.
//!
//! This crate contains every concept shared by the transport, the dialect
//! capability providers and the dispatch client: newtype identifiers, the
//! values that flow through one request/response cycle, the error taxonomy,
//! and the port traits infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no HTTP dependencies.
//! It defines *what* a transport and a dialect provide; infrastructure crates
//! define *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EndpointPath`, `SourceName`, `RequestId`) |
//! | [`types`] | Exchange values (`OutboundRequest`, `ResponseDescriptor`, `ResponseBody`, etc.) |
//! | [`errors`] | `BuildError`, `ExecutionError`, `SendError`, `SourceOpsError`, `RetryPolicy` |
//! | [`ports`] | `Transport`, `PgSourceOps`, `MssqlSourceOps` |
//! | [`sourceops`] | Dialect operation payloads |
//! | `testing` | `RecordingTransport` fake (feature `test-support`) |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod sourceops;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{
    BuildError, ExecutionError, ExecutionErrorKind, RetryPolicy, SendError, SourceOpsError,
};
pub use identifiers::{EndpointPath, RequestId, SourceName};
pub use ports::{MssqlSourceOps, PgSourceOps, Transport};
pub use sourceops::{MssqlRunSqlInput, PgRunSqlInput, ResultType, RunSqlArgs, RunSqlOutput};
pub use types::{
    ApiErrorBody, Exchange, HttpMethod, OutboundRequest, ResponseBody, ResponseDescriptor,
    StatusCode, Timestamp,
};

// Callers need the token type to cancel in-flight requests.
pub use tokio_util::sync::CancellationToken;
