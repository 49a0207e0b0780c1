//! The dispatch client.

use std::sync::Arc;

use async_trait::async_trait;
use dialects::{MssqlOps, PostgresOps};
use protocol::{
    EndpointPath, Exchange, HttpMethod, MssqlRunSqlInput, MssqlSourceOps, PgRunSqlInput,
    PgSourceOps, ResponseBody, RunSqlOutput, SendError, SourceOpsError, Transport,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{field, instrument, Span};

/// One handle over a shared transport and every dialect's capability provider.
///
/// Every delegate is built from the same `(transport, path)` pair, so the
/// generic [`Client::send`] and every dialect operation post to the same
/// endpoint through the same serialising transport. Dialect operations are
/// forwarded to the delegates unchanged; supporting another dialect means
/// adding one field and one forwarding impl.
///
/// Cloning is cheap and shares the transport.
#[derive(Debug)]
pub struct Client<T> {
    transport: Arc<T>,
    postgres: PostgresOps<T>,
    mssql: MssqlOps<T>,
    path: EndpointPath,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            postgres: self.postgres.clone(),
            mssql: self.mssql.clone(),
            path: self.path.clone(),
        }
    }
}

impl<T: Transport> Client<T> {
    /// Binds a client to `transport` and `path`. Performs no I/O.
    pub fn new(transport: Arc<T>, path: EndpointPath) -> Self {
        Self {
            postgres: PostgresOps::new(Arc::clone(&transport), path.clone()),
            mssql: MssqlOps::new(Arc::clone(&transport), path.clone()),
            transport,
            path,
        }
    }

    pub fn path(&self) -> &EndpointPath {
        &self.path
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The PostgreSQL delegate.
    pub fn postgres(&self) -> &PostgresOps<T> {
        &self.postgres
    }

    /// The MSSQL delegate.
    pub fn mssql(&self) -> &MssqlOps<T> {
        &self.mssql
    }

    /// Posts `body` to the client's endpoint and returns the response with its
    /// buffered payload.
    ///
    /// Equivalent to [`Client::send_with_cancel`] with a token that is never
    /// cancelled.
    pub async fn send<B>(&self, body: B) -> Result<Exchange, SendError>
    where
        B: Serialize + Send,
    {
        self.send_with_cancel(body, &CancellationToken::new()).await
    }

    /// Posts `body` to the client's endpoint; cancelling `cancel` aborts the
    /// call whether it is queued behind other requests or in flight.
    ///
    /// # Errors
    ///
    /// - [`SendError::Build`] if the request could not be built. The
    ///   transport's execution entry point is not invoked.
    /// - [`SendError::Execution`] if the exchange failed. The error carries
    ///   the response descriptor when the server answered; the partially or
    ///   semantically invalid payload is discarded.
    #[instrument(skip_all, fields(path = %self.path, request_id = field::Empty))]
    pub async fn send_with_cancel<B>(
        &self,
        body: B,
        cancel: &CancellationToken,
    ) -> Result<Exchange, SendError>
    where
        B: Serialize + Send,
    {
        let request = self
            .transport
            .new_request(HttpMethod::Post, &self.path, &body)?;
        drop(body);
        Span::current().record("request_id", field::display(request.request_id));

        let mut buffer = ResponseBody::new();
        let response = self.transport.execute(cancel, request, &mut buffer).await?;

        Ok(Exchange {
            response,
            body: buffer,
        })
    }
}

#[async_trait]
impl<T: Transport> PgSourceOps for Client<T> {
    async fn pg_run_sql(&self, input: PgRunSqlInput) -> Result<RunSqlOutput, SourceOpsError> {
        self.postgres.pg_run_sql(input).await
    }
}

#[async_trait]
impl<T: Transport> MssqlSourceOps for Client<T> {
    async fn mssql_run_sql(
        &self,
        input: MssqlRunSqlInput,
    ) -> Result<RunSqlOutput, SourceOpsError> {
        self.mssql.mssql_run_sql(input).await
    }
}
