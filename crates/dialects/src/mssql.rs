//! Microsoft SQL Server capability provider.

use std::sync::Arc;

use async_trait::async_trait;
use protocol::sourceops::MSSQL_RUN_SQL;
use protocol::{
    EndpointPath, MssqlRunSqlInput, MssqlSourceOps, RunSqlOutput, SourceOpsError, Transport,
};
use tracing::instrument;

use crate::exchange;

/// Operations on MSSQL sources, posted to one endpoint path through a shared
/// transport.
#[derive(Debug)]
pub struct MssqlOps<T> {
    transport: Arc<T>,
    path: EndpointPath,
}

impl<T> Clone for MssqlOps<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            path: self.path.clone(),
        }
    }
}

impl<T: Transport> MssqlOps<T> {
    pub fn new(transport: Arc<T>, path: EndpointPath) -> Self {
        Self { transport, path }
    }

    pub fn path(&self) -> &EndpointPath {
        &self.path
    }
}

#[async_trait]
impl<T: Transport> MssqlSourceOps for MssqlOps<T> {
    #[instrument(skip(self, input), fields(path = %self.path, source = %input.source))]
    async fn mssql_run_sql(
        &self,
        input: MssqlRunSqlInput,
    ) -> Result<RunSqlOutput, SourceOpsError> {
        exchange::query(self.transport.as_ref(), &self.path, MSSQL_RUN_SQL, input).await
    }
}

#[cfg(test)]
mod tests {
    use protocol::testing::{RecordingTransport, ScriptedReply};
    use protocol::{RunSqlArgs, SourceName};

    use super::*;

    #[tokio::test]
    async fn run_sql_uses_mssql_operation_name() {
        let transport = Arc::new(RecordingTransport::new());
        transport.push_reply(ScriptedReply::json(
            200,
            r#"{"result_type":"CommandOk","result":null}"#,
        ));
        let ops = MssqlOps::new(
            Arc::clone(&transport),
            EndpointPath::new("v2/query").expect("non-empty"),
        );

        let output = ops
            .mssql_run_sql(
                RunSqlArgs::new(SourceName::new("mssql").expect("non-empty"), "create table t (id int)")
                    .cascade(false),
            )
            .await
            .expect("run_sql");
        assert!(output.rows().is_empty());

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).expect("json body");
        assert_eq!(sent["type"], "mssql_run_sql");
        assert_eq!(sent["args"]["source"], "mssql");
        assert_eq!(sent["args"]["cascade"], false);
    }

    #[tokio::test]
    async fn network_failure_carries_no_response() {
        let transport = Arc::new(RecordingTransport::new());
        transport.push_reply(ScriptedReply::NetworkFailure("connection reset".to_owned()));
        let ops = MssqlOps::new(
            Arc::clone(&transport),
            EndpointPath::new("v2/query").expect("non-empty"),
        );

        let err = ops
            .mssql_run_sql(RunSqlArgs::new(
                SourceName::new("mssql").expect("non-empty"),
                "select 1",
            ))
            .await
            .expect_err("network failure");

        match err {
            SourceOpsError::Send(send) => assert!(send.response().is_none()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
