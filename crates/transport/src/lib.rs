//! metaq HTTP transport adapter.
//!
//! Implements the [`protocol::Transport`] trait over `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL resolution, header defaults, admin-secret
//! injection, request serialisation, response streaming, and the
//! one-request-at-a-time gate all live here. Consumers see only
//! [`protocol::Transport`].
//!
//! ## Concurrency
//!
//! [`HttpTransport::execute`](protocol::Transport::execute) holds an async
//! mutex for the whole exchange, body streaming included. Every dispatch
//! client and capability provider sharing one transport is therefore
//! serialised against the others. Timeouts come from
//! [`TransportConfig::timeout_secs`] and from the caller's cancellation token;
//! nothing here retries.

pub mod config;
pub mod http;

pub use config::{ConfigError, TransportConfig};
pub use http::{HttpTransport, REQUEST_ID_HEADER};
