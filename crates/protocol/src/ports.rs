//! Port traits implemented by infrastructure crates.
//!
//! [`Transport`] is the HTTP primitive every request goes through.
//! [`PgSourceOps`] and [`MssqlSourceOps`] are the per-dialect operation sets;
//! a new dialect is added by defining another trait here and a provider for
//! it, without touching the generic send path or the existing dialects.

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::sourceops::{MssqlRunSqlInput, PgRunSqlInput, RunSqlOutput};
use crate::{
    BuildError, EndpointPath, ExecutionError, HttpMethod, OutboundRequest, ResponseBody,
    ResponseDescriptor, SourceOpsError,
};

/// Builds HTTP requests against a base URL and executes them one at a time.
///
/// ## Contract
///
/// - [`Transport::new_request`] performs no I/O.
/// - [`Transport::execute`] lets at most one request proceed at a time per
///   transport instance. Callers queue; the guard is held from sending the
///   request until the last body chunk has been written to `sink`, and is
///   released on every exit path.
/// - Cancelling `cancel` while a call is queued or in flight fails that call
///   with [`crate::ExecutionErrorKind::Cancelled`] and leaves other queued
///   callers untouched.
/// - A non-2xx status is a failure; the descriptor is attached to the error.
///
/// Implementations are shared behind an `Arc` and must be safe for
/// concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Builds a request for `path` carrying `body` serialised as JSON.
    fn new_request<B>(
        &self,
        method: HttpMethod,
        path: &EndpointPath,
        body: &B,
    ) -> Result<OutboundRequest, BuildError>
    where
        B: Serialize + ?Sized;

    /// Executes `request`, writing the response payload into `sink`.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        request: OutboundRequest,
        sink: &mut ResponseBody,
    ) -> Result<ResponseDescriptor, ExecutionError>;
}

/// Operations on a PostgreSQL source of the remote service.
#[async_trait]
pub trait PgSourceOps: Send + Sync {
    /// Runs raw SQL against a PostgreSQL source (`run_sql`).
    async fn pg_run_sql(&self, input: PgRunSqlInput) -> Result<RunSqlOutput, SourceOpsError>;
}

/// Operations on a Microsoft SQL Server source of the remote service.
#[async_trait]
pub trait MssqlSourceOps: Send + Sync {
    /// Runs raw SQL against an MSSQL source (`mssql_run_sql`).
    async fn mssql_run_sql(&self, input: MssqlRunSqlInput)
        -> Result<RunSqlOutput, SourceOpsError>;
}
