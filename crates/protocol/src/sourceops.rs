//! Request and response payloads of the dialect-specific operations.
//!
//! Every operation travels in the same envelope, `{"type": <op>, "args": ...}`,
//! posted to the client's endpoint path.

use serde::{Deserialize, Serialize};

use crate::SourceName;

/// Operation name of PostgreSQL raw SQL execution.
pub const PG_RUN_SQL: &str = "run_sql";

/// Operation name of MSSQL raw SQL execution.
pub const MSSQL_RUN_SQL: &str = "mssql_run_sql";

/// Wire envelope of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEnvelope<A> {
    #[serde(rename = "type")]
    pub kind: String,
    pub args: A,
}

impl<A> QueryEnvelope<A> {
    pub fn new(kind: impl Into<String>, args: A) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }
}

// ---------------------------------------------------------------------------
// run_sql
// ---------------------------------------------------------------------------

/// Arguments of a raw SQL query. Optional flags are omitted when unset so the
/// service applies its own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSqlArgs {
    pub sql: String,
    pub source: SourceName,
    /// Cascade dependent metadata when the SQL drops or alters objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade: Option<bool>,
    /// Re-check metadata consistency after the SQL ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_metadata_consistency: Option<bool>,
    /// Run inside a read-only transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl RunSqlArgs {
    pub fn new(source: SourceName, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            source,
            cascade: None,
            check_metadata_consistency: None,
            read_only: None,
        }
    }

    #[must_use]
    pub fn cascade(mut self, cascade: bool) -> Self {
        self.cascade = Some(cascade);
        self
    }

    #[must_use]
    pub fn check_metadata_consistency(mut self, check: bool) -> Self {
        self.check_metadata_consistency = Some(check);
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }
}

/// Input of [`crate::PgSourceOps::pg_run_sql`].
pub type PgRunSqlInput = RunSqlArgs;

/// Input of [`crate::MssqlSourceOps::mssql_run_sql`].
pub type MssqlRunSqlInput = RunSqlArgs;

/// Shape of a raw SQL result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    /// The statement returned rows; the first row holds the column names.
    TuplesOk,
    /// The statement returned no rows.
    CommandOk,
}

/// Output of a raw SQL query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSqlOutput {
    #[serde(default)]
    pub result_type: Option<ResultType>,
    /// Rows as text cells; SQL `NULL` is `None`.
    #[serde(default)]
    pub result: Option<Vec<Vec<Option<String>>>>,
}

impl RunSqlOutput {
    /// Column names, when the result carries rows.
    pub fn header(&self) -> Option<&[Option<String>]> {
        if self.result_type == Some(ResultType::CommandOk) {
            return None;
        }
        self.result.as_ref()?.first().map(Vec::as_slice)
    }

    /// Data rows, excluding the header row.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        match (&self.result, self.result_type) {
            (Some(rows), Some(ResultType::TuplesOk)) if !rows.is_empty() => &rows[1..],
            _ => &[],
        }
    }
}
