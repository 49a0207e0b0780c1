//! Transport configuration.
//!
//! [`TransportConfig`] can be deserialised from any serde source or read from
//! the process environment with [`TransportConfig::from_env`]. It is validated
//! once, when an [`crate::HttpTransport`] is built; a transport never exists
//! with an invalid configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the service base URL.
pub const ENV_ENDPOINT: &str = "METAQ_ENDPOINT";
/// Environment variable holding the admin secret.
pub const ENV_ADMIN_SECRET: &str = "METAQ_ADMIN_SECRET";
/// Environment variable holding the request timeout in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "METAQ_TIMEOUT_SECS";

const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
const DEFAULT_ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

/// Errors produced while validating a [`TransportConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    /// The underlying HTTP client could not be constructed (e.g. TLS backend
    /// initialisation failed).
    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

/// Connection settings of an [`crate::HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL of the metadata service; endpoint paths are resolved against it.
    pub base_url: String,
    /// Admin secret sent with every request, if set.
    pub admin_secret: Option<String>,
    /// Header the admin secret is sent in.
    pub admin_secret_header: String,
    /// Whole-request timeout in seconds. `None` leaves timing to the caller's
    /// cancellation token.
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_owned(),
            admin_secret: None,
            admin_secret_header: DEFAULT_ADMIN_SECRET_HEADER.to_owned(),
            timeout_secs: None,
            user_agent: concat!("metaq/", env!("CARGO_PKG_VERSION")).to_owned(),
            headers: BTreeMap::new(),
        }
    }
}

impl TransportConfig {
    /// Creates a default configuration pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Reads the configuration from `METAQ_*` environment variables, falling
    /// back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.is_empty()) {
            config.base_url = endpoint;
        }
        config.admin_secret = lookup(ENV_ADMIN_SECRET).filter(|v| !v.is_empty());
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            config.timeout_secs = Some(secs);
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Parses the base URL, forcing a trailing `/` so relative endpoint
    /// paths extend the base path instead of replacing its last segment.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base".to_owned()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Returns every header sent by default, admin secret included.
    pub fn default_headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>, ConfigError> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        if let Some(secret) = &self.admin_secret {
            let (name, mut value) = parse_header(&self.admin_secret_header, secret)?;
            value.set_sensitive(true);
            headers.push((name, value));
        }
        for (name, value) in &self.headers {
            headers.push(parse_header(name, value)?);
        }
        Ok(headers)
    }

    /// Checks every field without building a client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        self.default_headers()?;
        Ok(())
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidHeader {
        name: name.to_owned(),
        reason,
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn unset_environment_yields_defaults() {
        let config = TransportConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config, TransportConfig::default());
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(config.timeout().is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = TransportConfig::from_lookup(lookup_from(&[
            (ENV_ENDPOINT, "https://meta.example.com"),
            (ENV_ADMIN_SECRET, "s3cret"),
            (ENV_TIMEOUT_SECS, "30"),
        ]))
        .expect("config");

        assert_eq!(config.base_url, "https://meta.example.com");
        assert_eq!(config.admin_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let err = TransportConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, "soon")]))
            .expect_err("invalid timeout");
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_TIMEOUT_SECS, .. }));
    }

    #[rstest]
    #[case::bare_host("http://localhost:8080", "http://localhost:8080/")]
    #[case::nested_path("https://meta.example.com/api", "https://meta.example.com/api/")]
    #[case::trailing_slash("https://meta.example.com/api/", "https://meta.example.com/api/")]
    fn base_url_gets_trailing_slash(#[case] raw: &str, #[case] expected: &str) {
        let url = TransportConfig::new(raw).parsed_base_url().expect("valid url");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case::not_a_url("not a url")]
    #[case::wrong_scheme("ftp://meta.example.com")]
    #[case::opaque("mailto:admin@example.com")]
    fn invalid_base_urls_are_rejected(#[case] raw: &str) {
        let err = TransportConfig::new(raw).validate().expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = TransportConfig::default()
            .with_header("bad header", "v")
            .validate()
            .expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidHeader { .. }));
    }

    #[test]
    fn admin_secret_is_sent_as_sensitive_header() {
        let headers = TransportConfig::default()
            .with_admin_secret("s3cret")
            .default_headers()
            .expect("headers");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0.as_str(), "x-hasura-admin-secret");
        assert!(headers[0].1.is_sensitive());
    }
}
