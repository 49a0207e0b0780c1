//! metaq dispatch client.
//!
//! [`Client`] composes a shared [`protocol::Transport`] with one capability
//! provider per backing-database dialect and exposes all three surfaces
//! through one handle:
//!
//! - the dialect-agnostic [`Client::send`], which posts an arbitrary
//!   serialisable body to the client's endpoint path;
//! - [`protocol::PgSourceOps`], forwarded to [`dialects::PostgresOps`];
//! - [`protocol::MssqlSourceOps`], forwarded to [`dialects::MssqlOps`].
//!
//! ## Architectural Layer
//!
//! **Composition.** The client adds no dialect logic, no locking and no
//! retries. Serialisation of concurrent calls is the transport's job; error
//! values are returned to the caller unchanged.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dispatch::Client;
//! use protocol::{EndpointPath, PgSourceOps, RunSqlArgs, SourceName};
//! use transport::{HttpTransport, TransportConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new(&TransportConfig::new("http://localhost:8080"))?);
//! let client = Client::new(transport, EndpointPath::new("v2/query").unwrap());
//!
//! let exchange = client.send(serde_json::json!({"type": "export_metadata", "args": {}})).await?;
//! println!("{}", exchange.response.status);
//!
//! let source = SourceName::new("default").unwrap();
//! let output = client.pg_run_sql(RunSqlArgs::new(source, "select 1")).await?;
//! println!("{:?}", output.rows());
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::Client;
