//! metaq CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Read configuration**: [`transport::TransportConfig::from_env`] plus
//!    `METAQ_QUERY_PATH` (endpoint path, default `v2/query`) and
//!    `METAQ_LOG_FORMAT` (`json` or text).
//! 2. **Wire observability**: install `tracing-subscriber` with an
//!    `EnvFilter` (`RUST_LOG`, default `info`) writing to stderr. All spans and
//!    events emitted by every crate in the workspace flow through this layer.
//! 3. **Construct infrastructure**: build the `HttpTransport` and a
//!    `dispatch::Client` bound to it.
//! 4. **Dispatch one query**: read a JSON body from the file named by the
//!    first argument (or stdin), send it, print the response body to stdout.
//!    Ctrl-C cancels the in-flight request.
//!
//! Exit codes: `0` success, `2` the service rejected the request (status and
//! error on stderr), `1` anything else.

use std::io::{Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use dispatch::Client;
use protocol::{EndpointPath, SendError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transport::{HttpTransport, TransportConfig};

const ENV_QUERY_PATH: &str = "METAQ_QUERY_PATH";
const ENV_LOG_FORMAT: &str = "METAQ_LOG_FORMAT";
const DEFAULT_QUERY_PATH: &str = "v2/query";

/// Exit code for requests the service answered with a non-2xx status.
const EXIT_REJECTED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

fn query_path(raw: Option<String>) -> anyhow::Result<EndpointPath> {
    match raw {
        None => EndpointPath::new(DEFAULT_QUERY_PATH)
            .ok_or_else(|| anyhow!("default query path is empty")),
        Some(value) => {
            EndpointPath::new(value).ok_or_else(|| anyhow!("{ENV_QUERY_PATH} must not be empty"))
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }
}

fn read_body(file: Option<&str>) -> anyhow::Result<serde_json::Value> {
    let mut raw = String::new();
    match file {
        Some(name) if name != "-" => {
            raw = std::fs::read_to_string(name).with_context(|| format!("reading {name}"))?;
        }
        _ => {
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("reading request body from stdin")?;
        }
    }
    serde_json::from_str(&raw).context("request body is not valid JSON")
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = TransportConfig::from_env().context("reading transport configuration")?;
    let path = query_path(std::env::var(ENV_QUERY_PATH).ok())?;
    let file = std::env::args().nth(1);
    let body = read_body(file.as_deref())?;

    let transport = HttpTransport::new(&config).context("building HTTP transport")?;
    info!(base_url = %transport.base_url(), %path, "dispatching query");
    let client = Client::new(Arc::new(transport), path);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling request");
            on_interrupt.cancel();
        }
    });

    match client.send_with_cancel(body, &cancel).await {
        Ok(exchange) => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(exchange.body.as_bytes())
                .and_then(|()| stdout.write_all(b"\n"))
                .context("writing response body")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(SendError::Execution(err)) if err.response().is_some() => {
            let status = err.status().map(|s| s.to_string()).unwrap_or_default();
            eprintln!("request rejected with status {status}: {err}");
            if let Some(api_error) = err.api_error() {
                if api_error.is_access_denied() {
                    eprintln!("check METAQ_ADMIN_SECRET");
                }
            }
            Ok(ExitCode::from(EXIT_REJECTED))
        }
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::parse(std::env::var(ENV_LOG_FORMAT).ok().as_deref()));
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::unset(None, LogFormat::Text)]
    #[case::json(Some("json"), LogFormat::Json)]
    #[case::upper(Some(" JSON "), LogFormat::Json)]
    #[case::other(Some("pretty"), LogFormat::Text)]
    fn log_format_parsing(#[case] raw: Option<&str>, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::parse(raw), expected);
    }

    #[test]
    fn query_path_defaults_to_v2_query() {
        assert_eq!(query_path(None).expect("path").as_str(), "v2/query");
        assert_eq!(
            query_path(Some("v1/metadata".to_owned())).expect("path").as_str(),
            "v1/metadata"
        );
        assert!(query_path(Some(String::new())).is_err());
    }

    #[test]
    fn body_file_must_hold_json() {
        let dir = std::env::temp_dir().join(format!("metaq-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let good = dir.join("good.json");
        let bad = dir.join("bad.json");
        std::fs::write(&good, r#"{"type":"run_sql","args":{"sql":"select 1"}}"#).expect("write");
        std::fs::write(&bad, "select 1").expect("write");

        let body = read_body(good.to_str()).expect("json body");
        assert_eq!(body["type"], "run_sql");
        assert!(read_body(bad.to_str()).is_err());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
