//! Error taxonomy for the exporter
//!
//! Every failure inside a scrape is a `CollectError`; the scrape layer
//! collapses all of them into `pbs_up 0`. `ConfigError` only happens at
//! startup and stops the process.

use std::path::PathBuf;

/// Failures that abort a scrape.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Connect, DNS, TLS or timeout failure. Never retried.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Upstream answered with a non-2xx status.
    #[error("status code {code} returned from endpoint: {url}")]
    UpstreamStatus { code: u16, url: String },
    /// Body was not valid JSON or lacked required structure.
    #[error("invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl CollectError {
    pub fn decode(url: impl Into<String>, reason: impl ToString) -> Self {
        CollectError::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Startup configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to parse timeout {value:?}: {source}")]
    Timeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("unable to parse insecure {0:?}: expected a boolean")]
    Insecure(String),
    #[error("unknown log level {0:?}")]
    LogLevel(String),
    #[error("metrics path must start with '/' and hold no route captures: {0:?}")]
    MetricsPath(String),
    #[error("unable to read secret file {path}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
