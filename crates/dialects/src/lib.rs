//! metaq capability providers.
//!
//! One provider per backing-database dialect, each implementing that
//! dialect's port trait from [`protocol`]:
//!
//! | Provider | Port | Operation |
//! |----------|------|-----------|
//! | [`PostgresOps`] | [`protocol::PgSourceOps`] | `run_sql` |
//! | [`MssqlOps`] | [`protocol::MssqlSourceOps`] | `mssql_run_sql` |
//!
//! Providers are constructed from the same `(transport, path)` pair as the
//! dispatch client that holds them, post through that shared transport, and
//! decode the service's JSON replies. [`sql`] holds PostgreSQL text helpers.

mod exchange;
pub mod mssql;
pub mod postgres;
pub mod sql;

pub use mssql::MssqlOps;
pub use postgres::PostgresOps;
