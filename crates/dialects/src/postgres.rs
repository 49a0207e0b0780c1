//! PostgreSQL capability provider.

use std::sync::Arc;

use async_trait::async_trait;
use protocol::sourceops::PG_RUN_SQL;
use protocol::{
    EndpointPath, PgRunSqlInput, PgSourceOps, RunSqlArgs, RunSqlOutput, SourceName,
    SourceOpsError, Transport,
};
use tracing::instrument;

use crate::exchange;
use crate::sql;

/// Operations on PostgreSQL sources, posted to one endpoint path through a
/// shared transport.
#[derive(Debug)]
pub struct PostgresOps<T> {
    transport: Arc<T>,
    path: EndpointPath,
}

impl<T> Clone for PostgresOps<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            path: self.path.clone(),
        }
    }
}

impl<T: Transport> PostgresOps<T> {
    pub fn new(transport: Arc<T>, path: EndpointPath) -> Self {
        Self { transport, path }
    }

    pub fn path(&self) -> &EndpointPath {
        &self.path
    }

    /// Returns the planner's row estimate for `schema.table`, or `None` when
    /// the table has no statistics row.
    ///
    /// The query runs read-only.
    pub async fn estimate_row_count(
        &self,
        source: SourceName,
        schema: &str,
        table: &str,
    ) -> Result<Option<i64>, SourceOpsError> {
        let args = RunSqlArgs::new(source, sql::estimate_count_query(schema, table)).read_only(true);
        let output = self.pg_run_sql(args).await?;

        let Some(cell) = output.rows().first().and_then(|row| row.first()) else {
            return Ok(None);
        };
        match cell {
            None => Ok(None),
            Some(text) => text
                .parse::<i64>()
                .map(Some)
                .map_err(|e| SourceOpsError::Decode(format!("row estimate '{text}': {e}"))),
        }
    }
}

#[async_trait]
impl<T: Transport> PgSourceOps for PostgresOps<T> {
    #[instrument(skip(self, input), fields(path = %self.path, source = %input.source))]
    async fn pg_run_sql(&self, input: PgRunSqlInput) -> Result<RunSqlOutput, SourceOpsError> {
        exchange::query(self.transport.as_ref(), &self.path, PG_RUN_SQL, input).await
    }
}
